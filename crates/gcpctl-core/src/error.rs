//! Unified error handling for gcpctl-core
//!
//! Every failure of an outbound cloud call is a [`CoreError`]. Service
//! operations never propagate it; they convert it into an
//! [`OperationResult::Error`](crate::OperationResult) at their boundary.
//!
//! # Example
//!
//! ```rust
//! use gcpctl_core::CoreError;
//!
//! let err = CoreError::Api {
//!     status: 404,
//!     message: "The resource 'vm1' was not found".to_string(),
//!     reason: Some("notFound".to_string()),
//! };
//! assert!(err.is_not_found());
//! assert!(!err.is_retryable());
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::auth::AuthError;

/// Core error type for outbound API calls
#[derive(Error, Debug)]
pub enum CoreError {
    /// Error response from a Google Cloud API
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        reason: Option<String>,
    },

    /// Transport-level failure (connect, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Credentials could not be obtained
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Input rejected before any call was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// A long-running operation finished with errors
    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    fn status(&self) -> Option<u16> {
        match self {
            CoreError::Api { status, .. } => Some(*status),
            CoreError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true if this is an authentication/authorization error (401/403)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403)) || matches!(self, CoreError::Auth(_))
    }

    /// Returns true if this is a conflict/precondition error (409/412)
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self.status(), Some(409) | Some(412))
    }

    /// Returns true if this is a rate limiting or quota error (429)
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Returns true if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Returns true if this is a timeout error
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::Http(e) if e.is_timeout())
    }

    /// Returns true if this error is potentially retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limited()
            || self.is_server_error()
            || self.is_timeout()
            || matches!(self, CoreError::Http(e) if e.is_connect())
    }
}

/// Google JSON error envelope: `{"error": {"code", "message", "status", "errors": [...]}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

impl CoreError {
    /// Build an API error from a status code and raw response body
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let reason = envelope
                    .error
                    .errors
                    .into_iter()
                    .find_map(|e| e.reason)
                    .or(envelope.error.status);
                let message = if envelope.error.message.is_empty() {
                    format!("request failed with status {}", status)
                } else {
                    envelope.error.message
                };
                CoreError::Api {
                    status,
                    message,
                    reason,
                }
            }
            Err(_) => CoreError::Api {
                status,
                message: if body.trim().is_empty() {
                    format!("request failed with status {}", status)
                } else {
                    body.trim().to_string()
                },
                reason: None,
            },
        }
    }
}
