//! The oracle adapter: typed calls over a [`Provider`].

use std::fmt;
use std::sync::Arc;

use rollcall_config::AppConfig;
use rollcall_core::error::OracleError;
use rollcall_core::{Classification, ImagePayload, Message, Name, Provider, ProviderRequest};
use tracing::{debug, info};

use crate::prompt;
use crate::response;

/// What kind of image an extraction call is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// An official roster (photo or scan of a list)
    Roster,
    /// A session capture (meeting screenshot)
    Observation,
}

impl ExtractionMode {
    fn prompt(self) -> &'static str {
        match self {
            ExtractionMode::Roster => prompt::ROSTER_EXTRACTION_PROMPT,
            ExtractionMode::Observation => prompt::OBSERVATION_EXTRACTION_PROMPT,
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Roster => f.write_str("roster"),
            ExtractionMode::Observation => f.write_str("observation"),
        }
    }
}

/// Issues extraction and matching requests and enforces their contracts.
pub struct OracleAdapter {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    strict: bool,
    min_name_chars: usize,
}

impl OracleAdapter {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            strict: true,
            min_name_chars: 2,
        }
    }

    /// Build an adapter with the model, sampling and validation settings
    /// from `config`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let model = config.model_for(provider.name());
        Self::new(provider, model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_strict_response(config.matching.strict_response)
            .with_min_name_chars(config.extraction.min_oracle_name_chars)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_strict_response(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_min_name_chars(mut self, min_chars: usize) -> Self {
        self.min_name_chars = min_chars;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, messages: Vec<Message>) -> ProviderRequest {
        let request = ProviderRequest::new(&self.model, messages).with_temperature(self.temperature);
        match self.max_tokens {
            Some(max) => request.with_max_tokens(max),
            None => request,
        }
    }

    /// Read the names in one image.
    ///
    /// An empty list is a valid answer. Only transport failures are errors.
    pub async fn extract_names(
        &self,
        image: ImagePayload,
        mode: ExtractionMode,
    ) -> Result<Vec<Name>, OracleError> {
        let source = image.source.clone();
        let request = self.request(vec![Message::user_with_image(mode.prompt(), image)]);

        let response = self.provider.complete(request).await?;
        let names = response::parse_name_lines(&response.message.content, self.min_name_chars);

        debug!(%source, %mode, names = names.len(), "Extraction reply parsed");
        Ok(names)
    }

    /// Classify `observed` against `roster` in a single matching request.
    ///
    /// The reply is validated whole; a malformed reply yields no partial
    /// classification.
    pub async fn classify(
        &self,
        roster: &[Name],
        observed: &[Name],
    ) -> Result<Classification, OracleError> {
        let payload = prompt::matching_payload(roster, observed);
        let request = self.request(vec![
            Message::system(prompt::MATCHING_SYSTEM_PROMPT),
            Message::user(payload),
        ]);

        info!(
            provider = %self.provider.name(),
            model = %self.model,
            roster = roster.len(),
            observed = observed.len(),
            "Sending matching request"
        );

        let response = self.provider.complete(request).await?;
        let classification = response::parse_matching_response(&response.message.content, self.strict)?;

        let counts = classification.counts();
        info!(
            present = counts.present,
            absent = counts.absent,
            unexpected = counts.unexpected,
            "Matching response accepted"
        );
        Ok(classification)
    }
}
