//! OpenAI-compatible chat completions.
//!
//! Covers OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions` with image input. Images travel inline as base64
//! `data:` URLs.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rollcall_core::error::ProviderError;
use rollcall_core::message::{ImagePayload, Message, Role};
use rollcall_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{self, DEFAULT_TIMEOUT};

/// A provider speaking the OpenAI chat completions dialect.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_timeout(name, base_url, api_key, DEFAULT_TIMEOUT)
    }

    /// Requests give up after `timeout`.
    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: http::client(timeout),
        }
    }

    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Local Ollama; the key is ignored by the server.
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
        )
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    async fn get_models(&self) -> Result<reqwest::Response, ProviderError> {
        self.auth(self.client.get(format!("{}/models", self.base_url)))
            .send()
            .await
            .map_err(http::transport_error)
    }
}

impl ChatMessage {
    /// A message with images becomes a part list: the text part, then one
    /// `image_url` part per image.
    fn from_message(m: &Message) -> Self {
        let role = match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        let content = if m.images.is_empty() {
            ChatContent::Text(m.content.clone())
        } else {
            let mut parts = Vec::with_capacity(m.images.len() + 1);
            parts.push(ChatPart::Text {
                text: m.content.clone(),
            });
            parts.extend(m.images.iter().map(|img| ChatPart::ImageUrl {
                image_url: ImageUrl { url: data_url(img) },
            }));
            ChatContent::Parts(parts)
        };
        Self { role, content }
    }
}

fn data_url(image: &ImagePayload) -> String {
    format!(
        "data:{};base64,{}",
        image.media_type,
        STANDARD.encode(&image.data)
    )
}

fn into_provider_response(resp: ChatResponse) -> Result<ProviderResponse, ProviderError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| http::decode_error("chat completions", "no choices"))?;

    Ok(ProviderResponse {
        message: Message::assistant(choice.message.content.unwrap_or_default()),
        usage: resp.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        model: resp.model,
    })
}

#[async_trait]
impl rollcall_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = ChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(ChatMessage::from_message).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let images: usize = request.messages.iter().map(|m| m.images.len()).sum();
        debug!(provider = %self.name, model = %request.model, images, "Sending completion request");

        let response = self
            .auth(self.client.post(format!("{}/chat/completions", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(http::transport_error)?;
        let response = http::check_status(response, &self.name, &request.model).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| http::decode_error(&self.name, e))?;
        into_provider_response(parsed)
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        let response = self.get_models().await?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }
        let list: ModelList = response
            .json()
            .await
            .map_err(|e| http::decode_error(&self.name, e))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(self.get_models().await?.status().is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: ChatContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ChatPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
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
