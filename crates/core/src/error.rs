//! Error types for the Rollcall domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Rollcall operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Run preconditions ---
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    // --- Roster / observation extraction ---
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    // --- Matching oracle ---
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    // --- Review workflow misuse ---
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    // --- Provider transport ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error aborts an analysis run (as opposed to a local
    /// usage error that leaves existing state untouched).
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            Error::Input(_) | Error::Extraction(_) | Error::Oracle(_) | Error::Provider(_)
        )
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Preconditions checked before a run starts. The run never begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("No roster source provided")]
    MissingRoster,

    #[error("No session capture images provided")]
    NoObservationImages,

    #[error("Unsupported source '{path}': {reason}")]
    UnsupportedSource { path: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("No candidate names found in roster source '{source_name}'")]
    NoCandidates { source_name: String },

    #[error("Failed to read tabular source '{source_name}': {reason}")]
    Tabular { source_name: String, reason: String },

    #[error("Failed to read image '{source_name}': {reason}")]
    Image { source_name: String, reason: String },

    #[error("Extraction of capture {index} of {total} failed: {reason}")]
    CaptureFailed {
        index: usize,
        total: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Malformed matching response: {0}")]
    MalformedResponse(String),

    #[error("Oracle call failed: {0}")]
    Call(#[from] ProviderError),
}

/// Usage errors in the review workflow. Guarded locally; never corrupts state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Index {index} is out of range (present has {len} entries)")]
    InvalidIndex { index: usize, len: usize },

    #[error("No active review session")]
    NoActiveSession,

    #[error("No finalized classification")]
    NotFinalized,

    #[error("No bulk change has been requested")]
    NoStagedChange,

    #[error("Selection is empty")]
    EmptySelection,

    #[error("No attendee named '{name}'")]
    UnknownName { name: String },

    #[error("An analysis run is already in progress")]
    RunInProgress,

    #[error("Analysis run {run_id} was superseded by a reset")]
    StaleRun { run_id: u64 },

    #[error("Operation '{operation}' is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}
