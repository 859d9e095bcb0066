//! Error taxonomy and classification for the Mealie gateway.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Main error type for the Mealie gateway.
///
/// This is a closed taxonomy: every failure surfaced to a caller is one of
/// these kinds, carrying enough context for retry decisions and for the
/// response envelope at the unit boundary.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Network error (connection refused, timeout, DNS failure, 5xx fault)
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
        /// HTTP status code when the fault came from a server response
        status_code: Option<u16>,
    },

    /// Authentication error (invalid or expired API token, 401/403)
    #[error("Authentication error: {message}")]
    Authentication {
        /// Error message describing the authentication issue
        message: String,
    },

    /// Validation error (malformed request rejected by the remote API, 400)
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation issue
        message: String,
        /// Structured validation details, when the API provided them
        details: Option<Value>,
    },

    /// Rate limit error (429, quota exceeded)
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        /// Error message describing the rate limit
        message: String,
        /// Duration to wait before retrying, when provided by the API
        retry_after: Option<Duration>,
    },

    /// Configuration error (invalid settings, missing required fields)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Unknown error (unclassified failures, unexpected status codes)
    #[error("Unknown error: {message}")]
    Unknown {
        /// Error message
        message: String,
        /// HTTP status code, when one was observed
        status_code: Option<u16>,
    },
}

impl GatewayError {
    /// Returns true if this error is retryable with exponential backoff.
    ///
    /// Retryable errors are network faults (including 5xx server faults,
    /// which are folded into the `Network` kind at classification time) and
    /// rate limits. Authentication, validation and configuration failures
    /// fail fast.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Network { .. } | GatewayError::RateLimit { .. }
        )
    }

    /// Returns the retry-after duration if the API provided one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Network { .. } => "NETWORK_ERROR",
            GatewayError::Authentication { .. } => "AUTH_ERROR",
            GatewayError::Validation { .. } => "VALIDATION_ERROR",
            GatewayError::RateLimit { .. } => "RATE_LIMIT",
            GatewayError::Configuration { .. } => "CONFIG_ERROR",
            GatewayError::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    /// Structured details for the response envelope, when any exist.
    pub fn details(&self) -> Option<Value> {
        match self {
            GatewayError::Validation { details, .. } => details.clone(),
            GatewayError::Network {
                status_code: Some(status),
                ..
            }
            | GatewayError::Unknown {
                status_code: Some(status),
                ..
            } => Some(serde_json::json!({ "status": status })),
            GatewayError::RateLimit {
                retry_after: Some(after),
                ..
            } => Some(serde_json::json!({ "retry_after_ms": after.as_millis() as u64 })),
            _ => None,
        }
    }

    /// Classify an HTTP error status into the taxonomy.
    ///
    /// Rules, in order: 429 is a rate limit; 5xx is a retryable server fault
    /// (recorded under the `Network` kind); 401/403 are authentication
    /// failures; 400 is a validation failure; any other 4xx is `Unknown` and
    /// not retried.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        match status {
            429 => GatewayError::RateLimit {
                message: format!("Rate limit exceeded: {}", truncated(body)),
                retry_after,
            },
            500..=599 => GatewayError::Network {
                message: format!("Server error {}: {}", status, truncated(body)),
                status_code: Some(status),
            },
            401 | 403 => GatewayError::Authentication {
                message: format!("Authentication failed ({}): {}", status, truncated(body)),
            },
            400 => GatewayError::Validation {
                message: format!("Request rejected: {}", truncated(body)),
                details: serde_json::from_str(body).ok(),
            },
            _ => GatewayError::Unknown {
                message: format!("Unexpected status {}: {}", status, truncated(body)),
                status_code: Some(status),
            },
        }
    }
}

// Response bodies can be arbitrarily large; keep error messages bounded.
fn truncated(body: &str) -> &str {
    let limit = 512.min(body.len());
    let mut end = limit;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

// Conversions from common error types

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Network {
                message: format!("Request timed out: {}", err),
                status_code: None,
            }
        } else if err.is_connect() || err.is_request() {
            GatewayError::Network {
                message: format!("Connection failed: {}", err),
                status_code: None,
            }
        } else {
            GatewayError::Network {
                message: format!("Network error: {}", err),
                status_code: None,
            }
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Unknown {
            message: format!("JSON serialization error: {}", err),
            status_code: None,
        }
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
