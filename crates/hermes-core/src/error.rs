use thiserror::Error;

/// HTTP status codes that mark a provider response as worth retrying.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Application-wide error types for Hermes.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (malformed URL, bad response body).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Geocoding provider returned a non-success status.
    #[error("Provider error (HTTP {status_code}): {message}")]
    ProviderError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// Input address was rejected before reaching any provider.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::ProviderError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }

    /// Returns true if this error should trip the circuit breaker.
    pub fn should_trip_circuit(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::ProviderError {
                status_code,
                retryable,
                ..
            } => {
                // Trip on rate limits (429) and server errors (5xx)
                *status_code == 429 || *status_code >= 500 || *retryable
            }
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("connection")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::NetworkError("reset".into()).is_retryable());
        assert!(AppError::Timeout(30).is_retryable());
        assert!(AppError::RateLimitExceeded.is_retryable());
        assert!(
            AppError::ProviderError {
                message: "server error".into(),
                status_code: 503,
                retryable: true,
            }
            .is_retryable()
        );
        assert!(!AppError::ValidationError("empty address".into()).is_retryable());
        assert!(!AppError::ConfigError("missing key".into()).is_retryable());
    }

    #[test]
    fn test_non_retryable_status() {
        let err = AppError::ProviderError {
            message: "bad request".into(),
            status_code: 400,
            retryable: RETRYABLE_STATUSES.contains(&400),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_circuit_tripping() {
        assert!(AppError::RateLimitExceeded.should_trip_circuit());
        assert!(AppError::Timeout(30).should_trip_circuit());
        assert!(!AppError::ValidationError("bad".into()).should_trip_circuit());
        assert!(!AppError::Generic("whatever".into()).should_trip_circuit());
    }
}
