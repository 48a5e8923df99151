//! MCP tools for Compute Engine, Cloud Run and managed resource lifecycle

pub mod cleanup;
pub mod compute;
pub mod firewall;
pub mod resources;
pub mod run;

use serde::Serialize;
use tower_mcp::{CallToolResult, Error as McpError};

use crate::error::ServerError;
use crate::state::AppState;

/// Serialize an operation outcome as the tool reply.
///
/// Failed operations are still replies: the caller inspects `status`.
pub fn reply<T: Serialize>(result: &T) -> Result<CallToolResult, McpError> {
    CallToolResult::from_serialize(result)
}

/// Reject mutating calls when the server runs read-only
pub fn require_write(state: &AppState) -> Result<(), McpError> {
    if state.is_write_allowed() {
        Ok(())
    } else {
        Err(McpError::tool(ServerError::ReadOnlyMode.to_string()))
    }
}
