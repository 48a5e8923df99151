//! Cross-service resource tools and the liveness probe

use std::sync::Arc;

use chrono::Utc;
use gcpctl_core::ops::resources;
use schemars::JsonSchema;
use serde::Deserialize;
use tower_mcp::extract::{Json, State};
use tower_mcp::{McpRouter, Tool, ToolBuilder};

use super::reply;
use crate::state::AppState;

/// Zone and region for tools that span both groups
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LocationInput {
    /// Zone for Compute Engine instances. Defaults to the configured zone.
    #[serde(default)]
    pub zone: Option<String>,
    /// Region for Cloud Run services. Defaults to the configured region.
    #[serde(default)]
    pub region: Option<String>,
}

/// Build the list_all_resources tool
pub fn list_all_resources(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("list_all_resources")
        .description(
            "List Compute Engine instances and Cloud Run services together in one uniform listing \
             with per-type counts. If one group cannot be listed the other is still returned and \
             the failure is reported under partial_failures.",
        )
        .read_only()
        .idempotent()
        .extractor_handler_typed::<_, _, _, LocationInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<LocationInput>| async move {
                let result = resources::list_all_resources(
                    state.context(),
                    input.zone.as_deref(),
                    input.region.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Build the get_resource_summary tool
pub fn get_resource_summary(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("get_resource_summary")
        .description(
            "Summarize the project: instance counts (total, running, stopped) and \
             Cloud Run service counts (total, ready).",
        )
        .read_only()
        .idempotent()
        .extractor_handler_typed::<_, _, _, LocationInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<LocationInput>| async move {
                let result = resources::get_resource_summary(
                    state.context(),
                    input.zone.as_deref(),
                    input.region.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Input for searching resources
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchResourcesInput {
    /// Case-insensitive text matched against names, label keys and values, and network tags
    pub query: String,
    /// Zone for Compute Engine instances. Defaults to the configured zone.
    #[serde(default)]
    pub zone: Option<String>,
    /// Region for Cloud Run services. Defaults to the configured region.
    #[serde(default)]
    pub region: Option<String>,
}

/// Build the search_resources tool
pub fn search_resources(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("search_resources")
        .description(
            "Search instances and Cloud Run services by name, label or network tag \
             (case-insensitive substring match).",
        )
        .read_only()
        .idempotent()
        .extractor_handler_typed::<_, _, _, SearchResourcesInput>(
            state,
            |State(state): State<Arc<AppState>>,
             Json(input): Json<SearchResourcesInput>| async move {
                let result = resources::search_resources(
                    state.context(),
                    &input.query,
                    input.zone.as_deref(),
                    input.region.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Input for the health check
#[derive(Debug, Deserialize, JsonSchema)]
pub struct HealthCheckInput {}

/// Build the health_check tool
pub fn health_check(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("health_check")
        .description("Verify that the MCP server is running. Makes no cloud API calls.")
        .read_only()
        .idempotent()
        .non_destructive()
        .extractor_handler_typed::<_, _, _, HealthCheckInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(_input): Json<HealthCheckInput>| async move {
                reply(&serde_json::json!({
                    "status": "healthy",
                    "message": "MCP Server is healthy",
                    "version": env!("CARGO_PKG_VERSION"),
                    "project_id": state.settings().project_id,
                    "read_only": state.read_only,
                    "timestamp": Utc::now().to_rfc3339(),
                }))
            },
        )
        .build()
}

pub const INSTRUCTIONS: &str = r#"
### Resources
- list_all_resources: Instances and services in one listing
- get_resource_summary: Counts by type and state
- search_resources: Find resources by name, label or tag
"#;

/// Build an MCP sub-router containing the aggregation tools
pub fn router(state: Arc<AppState>) -> McpRouter {
    McpRouter::new()
        .tool(list_all_resources(state.clone()))
        .tool(get_resource_summary(state.clone()))
        .tool(search_resources(state))
}
