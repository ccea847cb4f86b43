//! Provider router: selects the oracle backend based on config.
//!
//! Handles provider creation and lookup by name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use rollcall_core::provider::Provider;
use tracing::{debug, warn};

/// Routes oracle requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Name of the default provider.
    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// Every provider gets the matching request timeout, since a matching call
/// carries the whole roster and can run long. The default provider is
/// registered even when it has no `[providers.<name>]` table.
pub fn build_from_config(config: &rollcall_config::AppConfig) -> ProviderRouter {
    let timeout = Duration::from_secs(config.matching.request_timeout_secs);
    let mut router = ProviderRouter::new(&config.default_provider);

    let configured = config
        .providers
        .iter()
        .map(|(name, p)| (name.as_str(), p.api_key.as_deref(), p.api_url.as_deref()));
    let implicit_default = (!config.providers.contains_key(&config.default_provider))
        .then_some((config.default_provider.as_str(), None, None));

    for (name, api_key, api_url) in configured.chain(implicit_default) {
        let api_key = api_key.or(config.api_key.as_deref()).unwrap_or_default();
        router.register(name, build_provider(name, api_key, api_url, timeout));
    }

    debug!(providers = ?router.list(), default = %router.default_name(), "Providers registered");
    router
}

fn build_provider(
    name: &str,
    api_key: &str,
    api_url: Option<&str>,
    timeout: Duration,
) -> Arc<dyn Provider> {
    if name == "anthropic" {
        let provider = AnthropicProvider::with_timeout(api_key, timeout);
        return match api_url {
            Some(url) => Arc::new(provider.with_base_url(url)),
            None => Arc::new(provider),
        };
    }

    let base_url = match api_url.or_else(|| default_base_url(name)) {
        Some(url) => url,
        None => {
            warn!(provider = name, "No api_url for unknown provider, assuming a local server");
            LOCAL_FALLBACK_URL
        }
    };
    Arc::new(OpenAiCompatProvider::with_timeout(name, base_url, api_key, timeout))
}

const LOCAL_FALLBACK_URL: &str = "http://localhost:8000/v1";

/// Base URL of a well-known provider.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "anthropic" => "https://api.anthropic.com",
        "ollama" => "http://localhost:11434/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => LOCAL_FALLBACK_URL,
        _ => return None,
    };
    Some(url)
}
