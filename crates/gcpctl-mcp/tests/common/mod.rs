//! Shared helpers for calling tools in integration tests

use std::sync::Arc;

use gcpctl_core::testing::MockGcpServer;
use gcpctl_mcp::AppState;
use tower_mcp::Tool;

/// State wired to the mock server
pub fn state(server: &MockGcpServer, read_only: bool) -> Arc<AppState> {
    Arc::new(AppState::with_context(server.context(), read_only))
}

/// Helper to call a tool and get text result
pub async fn call_tool_text(tool: &Tool, input: serde_json::Value) -> String {
    let result = tool.call(input).await;
    result
        .content
        .first()
        .and_then(|c: &tower_mcp::Content| c.as_text())
        .unwrap_or_default()
        .to_string()
}

/// Helper to call a tool and get JSON result
pub async fn call_tool_json(tool: &Tool, input: serde_json::Value) -> serde_json::Value {
    let text = call_tool_text(tool, input).await;
    serde_json::from_str(&text).expect("valid JSON response")
}
