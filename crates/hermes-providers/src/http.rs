//! Shared reqwest plumbing for all provider adapters.

use std::time::Duration;

use hermes_core::error::{AppError, RETRYABLE_STATUSES};
use reqwest::{Client, Response};

const USER_AGENT: &str = "Hermes/0.2 (batch geocoder)";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How much of an error body is worth keeping in the error message.
const ERROR_BODY_LIMIT: usize = 200;

/// Build the HTTP client shared by the adapters.
pub fn build_client() -> Result<Client, AppError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

/// Map a reqwest send failure into the error taxonomy.
pub(crate) fn map_send_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(DEFAULT_TIMEOUT.as_secs())
    } else if err.is_connect() {
        AppError::NetworkError(format!("Connection failed: {err}"))
    } else {
        AppError::HttpError(err.to_string())
    }
}

/// Surface non-2xx responses as classified errors so the retry executor and
/// circuit breaker can act on them. 429 becomes `RateLimitExceeded`.
pub(crate) async fn check_status(response: Response, provider: &str) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status_code = status.as_u16();
    if status_code == 429 {
        return Err(AppError::RateLimitExceeded);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }

    let message = if body.is_empty() {
        format!("HTTP {status_code} from {provider}")
    } else {
        format!("HTTP {status_code} from {provider}: {body}")
    };

    Err(AppError::ProviderError {
        message,
        status_code,
        retryable: RETRYABLE_STATUSES.contains(&status_code),
    })
}

/// Error for response bodies that fail to deserialize.
pub(crate) fn body_error(provider: &str, err: reqwest::Error) -> AppError {
    AppError::HttpError(format!("Failed to parse {provider} response: {err}"))
}
