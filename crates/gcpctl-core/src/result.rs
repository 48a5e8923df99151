//! The uniform result shape returned by every service operation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of a service operation.
///
/// Serialized with an internal `status` tag; the operation-specific
/// `details` (or error `context`) are flattened into the same object:
///
/// ```rust
/// use gcpctl_core::OperationResult;
/// use serde_json::json;
///
/// let result = OperationResult::success("Instance vm1 started", json!({"instance_name": "vm1"}));
/// let value = serde_json::to_value(&result).unwrap();
/// assert_eq!(value["status"], "success");
/// assert_eq!(value["instance_name"], "vm1");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OperationResult<T> {
    Success {
        message: String,
        #[serde(flatten)]
        details: T,
    },
    Pending {
        message: String,
        #[serde(flatten)]
        details: T,
    },
    Error {
        message: String,
        error: String,
        #[serde(flatten)]
        context: Map<String, Value>,
    },
}

impl<T> OperationResult<T> {
    pub fn success(message: impl Into<String>, details: T) -> Self {
        Self::Success {
            message: message.into(),
            details,
        }
    }

    pub fn pending(message: impl Into<String>, details: T) -> Self {
        Self::Pending {
            message: message.into(),
            details,
        }
    }

    /// An error result. An empty `error` is replaced with the message so the
    /// field is never blank.
    pub fn error(message: impl Into<String>, error: impl Into<String>) -> Self {
        let message = message.into();
        let mut error = error.into();
        if error.trim().is_empty() {
            error = if message.is_empty() {
                "unknown error".to_string()
            } else {
                message.clone()
            };
        }
        Self::Error {
            message,
            error,
            context: Map::new(),
        }
    }

    /// Attach a context field to an error result; no-op on other variants
    #[must_use]
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Self::Error { context, .. } = &mut self {
            context.insert(key.to_string(), value.into());
        }
        self
    }

    /// The serialized `status` tag
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Pending { .. } => "pending",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. }
            | Self::Pending { message, .. }
            | Self::Error { message, .. } => message,
        }
    }

    /// Details of a success or pending result
    pub fn details(&self) -> Option<&T> {
        match self {
            Self::Success { details, .. } | Self::Pending { details, .. } => Some(details),
            Self::Error { .. } => None,
        }
    }

    pub fn into_details(self) -> Option<T> {
        match self {
            Self::Success { details, .. } | Self::Pending { details, .. } => Some(details),
            Self::Error { .. } => None,
        }
    }

    /// Re-type an error result
    pub fn cast_error<U>(self) -> Option<OperationResult<U>> {
        match self {
            Self::Error {
                message,
                error,
                context,
            } => Some(OperationResult::Error {
                message,
                error,
                context,
            }),
            _ => None,
        }
    }
}
