//! HTTP plumbing shared by the providers: client construction and the
//! mapping of transport failures and status codes onto [`ProviderError`].

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use rollcall_core::error::ProviderError;
use tracing::warn;

/// Default HTTP timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Wait suggested to the caller when a 429 carries no usable `Retry-After`.
const FALLBACK_RETRY_SECS: u64 = 5;

pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// A 200 whose body could not be decoded.
pub(crate) fn decode_error(provider: &str, e: impl std::fmt::Display) -> ProviderError {
    ProviderError::ApiError {
        status_code: 200,
        message: format!("Failed to parse {provider} response: {e}"),
    }
}

/// Seconds from a `Retry-After` header given in delta-seconds form.
fn retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(FALLBACK_RETRY_SECS)
}

/// Pass a successful response through; turn anything else into an error.
pub(crate) async fn check_status(
    response: Response,
    provider: &str,
    model: &str,
) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited {
            retry_after_secs: retry_after(response.headers()),
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
            ProviderError::AuthenticationFailed(format!("{provider} rejected the API key")),
        ),
        StatusCode::NOT_FOUND => Err(ProviderError::ModelNotFound(model.to_string())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            warn!(provider, status = status.as_u16(), body = %body, "Provider returned error");
            Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: body,
            })
        }
    }
}
