//! Service operations
//!
//! Each operation takes the explicit [`CloudContext`](crate::CloudContext),
//! performs its outbound call(s) and always returns an
//! [`OperationResult`]. Failures are logged and folded into
//! `OperationResult::Error`; nothing is propagated to the caller.

pub mod cleanup;
pub mod compute;
pub mod firewall;
pub mod resources;
pub mod run;

use tracing::error;

use crate::error::CoreError;
use crate::result::OperationResult;

/// Convert a failed call into an error result naming the resource.
///
/// `resource` reads like `instance vm1`; a 404 becomes "`<resource>` not found".
pub(crate) fn failure<T>(action: &str, resource: &str, err: &CoreError) -> OperationResult<T> {
    error!(action, resource, error = %err, "Operation failed");
    let detail = if err.is_not_found() {
        format!("{} not found: {}", resource, err)
    } else {
        err.to_string()
    };
    OperationResult::error(format!("Failed to {} {}", action, resource), detail)
}

/// Error result for input rejected before any outbound call
pub(crate) fn invalid<T>(
    action: &str,
    resource: &str,
    reason: impl Into<String>,
) -> OperationResult<T> {
    let reason = reason.into();
    error!(action, resource, reason = %reason, "Rejected invalid input");
    OperationResult::error(format!("Failed to {} {}", action, resource), reason)
}

/// Reject blank names up front
pub(crate) fn require_name(kind: &str, name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        Err(format!("{} name must not be empty", kind))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_mentions_not_found() {
        let err = CoreError::from_response(404, r#"{"error": {"code": 404, "message": "gone"}}"#);
        let result: OperationResult<()> = failure("delete", "instance vm1", &err);
        match result {
            OperationResult::Error { message, error, .. } => {
                assert_eq!(message, "Failed to delete instance vm1");
                assert!(error.contains("instance vm1 not found"));
            }
            _ => panic!("Expected error"),
        }
    }

    #[test]
    fn test_failure_keeps_api_message() {
        let err = CoreError::from_response(
            403,
            r#"{"error": {"code": 403, "message": "Permission denied"}}"#,
        );
        let result: OperationResult<()> = failure("start", "instance vm1", &err);
        match result {
            OperationResult::Error { error, .. } => assert!(error.contains("Permission denied")),
            _ => panic!("Expected error"),
        }
    }

    #[test]
    fn test_require_name() {
        assert!(require_name("Instance", "vm1").is_ok());
        assert_eq!(
            require_name("Instance", "  ").unwrap_err(),
            "Instance name must not be empty"
        );
    }
}
