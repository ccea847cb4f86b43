//! Anthropic Messages API.
//!
//! Differs from the OpenAI dialect in three ways that matter here: the key
//! goes in `x-api-key`, system text is a top-level field, and images are
//! base64 `image` blocks placed before the text of their turn.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rollcall_core::error::ProviderError;
use rollcall_core::message::{Message, Role};
use rollcall_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http::{self, DEFAULT_TIMEOUT};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// The API requires `max_tokens`; used when the request leaves it unset.
const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Offered by `list_models` when the models endpoint is unavailable.
const KNOWN_VISION_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
    "claude-3-5-sonnet-20241022",
];

pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Requests give up after `timeout`.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: http::client(timeout),
        }
    }

    /// Point at a proxy or test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    fn build_request<'a>(request: &'a ProviderRequest) -> MessagesRequest<'a> {
        let (system, turns): (Vec<&Message>, Vec<&Message>) = request
            .messages
            .iter()
            .partition(|m| m.role == Role::System);

        let system = (!system.is_empty()).then(|| {
            system
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        });

        MessagesRequest {
            model: &request.model,
            system,
            messages: turns.into_iter().map(Turn::from_message).collect(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
        }
    }

    fn into_provider_response(resp: MessagesResponse) -> ProviderResponse {
        let text = resp
            .content
            .iter()
            .filter_map(|block| match block {
                ReplyBlock::Text { text } => Some(text.as_str()),
                ReplyBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if resp.stop_reason.as_deref() == Some("max_tokens") {
            warn!(id = %resp.id, "Anthropic response truncated at max_tokens");
        }

        let mut message = Message::assistant(text);
        message.id = resp.id;

        ProviderResponse {
            message,
            usage: Some(Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            }),
            model: resp.model,
        }
    }

    async fn get_models(&self) -> Result<reqwest::Response, ProviderError> {
        self.headers(self.client.get(format!("{}/v1/models", self.base_url)))
            .send()
            .await
            .map_err(http::transport_error)
    }
}

impl Turn {
    fn from_message(m: &Message) -> Self {
        let role = if m.role == Role::Assistant {
            "assistant"
        } else {
            "user"
        };
        let content = if m.images.is_empty() {
            TurnContent::Text(m.content.clone())
        } else {
            let mut blocks: Vec<Block> = m
                .images
                .iter()
                .map(|img| Block::Image {
                    source: ImageSource {
                        kind: "base64",
                        media_type: img.media_type.clone(),
                        data: STANDARD.encode(&img.data),
                    },
                })
                .collect();
            blocks.push(Block::Text {
                text: m.content.clone(),
            });
            TurnContent::Blocks(blocks)
        };
        Self { role, content }
    }
}

#[async_trait]
impl rollcall_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::build_request(&request);
        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self
            .headers(self.client.post(format!("{}/v1/messages", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(http::transport_error)?;
        let response = http::check_status(response, "anthropic", &request.model).await?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| http::decode_error("anthropic", e))?;
        Ok(Self::into_provider_response(parsed))
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        let listed = match self.get_models().await {
            Ok(response) if response.status().is_success() => response
                .json::<ModelList>()
                .await
                .map(|list| list.data.into_iter().map(|m| m.id).collect::<Vec<_>>())
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        if listed.is_empty() {
            Ok(KNOWN_VISION_MODELS.iter().map(|m| m.to_string()).collect())
        } else {
            Ok(listed)
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let status = self.get_models().await?.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthenticationFailed(
                "anthropic rejected the API key".into(),
            ));
        }
        Ok(status.is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Turn>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Turn {
    role: &'static str,
    content: TurnContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TurnContent {
    Text(String),
    Blocks(Vec<Block>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    id: String,
    model: String,
    content: Vec<ReplyBlock>,
    usage: ReplyUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplyBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ReplyUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}
