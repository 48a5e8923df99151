//! TTL cleanup tools

use std::sync::Arc;

use gcpctl_core::ops::cleanup::{self, DEFAULT_EXPIRATION_WINDOW_DAYS};
use schemars::JsonSchema;
use serde::Deserialize;
use tower_mcp::extract::{Json, State};
use tower_mcp::{McpRouter, Tool, ToolBuilder};

use super::{reply, require_write};
use crate::state::AppState;

fn default_window_days() -> u32 {
    DEFAULT_EXPIRATION_WINDOW_DAYS
}

/// Input for cleaning up instances
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CleanupInstancesInput {
    /// Zone to scan. Defaults to the configured zone.
    #[serde(default)]
    pub zone: Option<String>,
    /// Only report what would be deleted
    #[serde(default)]
    pub dry_run: bool,
}

/// Build the cleanup_expired_instances tool
pub fn cleanup_expired_instances(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("cleanup_expired_instances")
        .description(
            "Delete managed Compute Engine instances whose ttl label has expired. Only \
             instances labeled managed-by=mcp are considered; ttl=never is kept. Pass \
             dry_run=true to preview without deleting. Requires write permission.",
        )
        .destructive()
        .extractor_handler_typed::<_, _, _, CleanupInstancesInput>(
            state,
            |State(state): State<Arc<AppState>>,
             Json(input): Json<CleanupInstancesInput>| async move {
                require_write(&state)?;
                let result = cleanup::cleanup_expired_instances(
                    state.context(),
                    input.zone.as_deref(),
                    input.dry_run,
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Input for cleaning up services
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CleanupServicesInput {
    /// Region to scan. Defaults to the configured region.
    #[serde(default)]
    pub region: Option<String>,
    /// Only report what would be deleted
    #[serde(default)]
    pub dry_run: bool,
}

/// Build the cleanup_expired_services tool
pub fn cleanup_expired_services(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("cleanup_expired_services")
        .description(
            "Delete managed Cloud Run services whose ttl label has expired. Pass dry_run=true to \
             preview without deleting. Requires write permission.",
        )
        .destructive()
        .extractor_handler_typed::<_, _, _, CleanupServicesInput>(
            state,
            |State(state): State<Arc<AppState>>,
             Json(input): Json<CleanupServicesInput>| async move {
                require_write(&state)?;
                let result = cleanup::cleanup_expired_services(
                    state.context(),
                    input.region.as_deref(),
                    input.dry_run,
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Input for cleaning up every resource type
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CleanupAllInput {
    /// Zone to scan for instances. Defaults to the configured zone.
    #[serde(default)]
    pub zone: Option<String>,
    /// Region to scan for services. Defaults to the configured region.
    #[serde(default)]
    pub region: Option<String>,
    /// Only report what would be deleted
    #[serde(default)]
    pub dry_run: bool,
}

/// Build the cleanup_all_expired_resources tool
pub fn cleanup_all_expired_resources(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("cleanup_all_expired_resources")
        .description(
            "Clean up expired instances and Cloud Run services in one pass, with a combined \
             summary and a report per resource type. Pass dry_run=true to preview without \
             deleting. Requires write permission.",
        )
        .destructive()
        .extractor_handler_typed::<_, _, _, CleanupAllInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<CleanupAllInput>| async move {
                require_write(&state)?;
                let result = cleanup::cleanup_all_expired_resources(
                    state.context(),
                    input.zone.as_deref(),
                    input.region.as_deref(),
                    input.dry_run,
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Input for listing expiring resources
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListExpiringInput {
    /// Zone to scan. Defaults to the configured zone.
    #[serde(default)]
    pub zone: Option<String>,
    /// Look-ahead window in days (default: 7)
    #[serde(default = "default_window_days")]
    pub days_until_expiration: u32,
}

/// Build the list_expiring_resources tool
pub fn list_expiring_resources(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("list_expiring_resources")
        .description(
            "List managed instances that expire within the given number of days, soonest first, \
             plus instances marked ttl=never.",
        )
        .read_only()
        .idempotent()
        .extractor_handler_typed::<_, _, _, ListExpiringInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<ListExpiringInput>| async move {
                let result = cleanup::list_expiring_resources(
                    state.context(),
                    input.zone.as_deref(),
                    input.days_until_expiration,
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

pub const INSTRUCTIONS: &str = r#"
### Lifecycle
- list_expiring_resources: Instances expiring soon and permanent ones

### Lifecycle - Write Operations (hidden with --read-only)
- cleanup_expired_instances: Delete expired instances (dry_run to preview)
- cleanup_expired_services: Delete expired services (dry_run to preview)
- cleanup_all_expired_resources: Both of the above in one call
"#;

/// Build an MCP sub-router containing the cleanup tools
pub fn router(state: Arc<AppState>) -> McpRouter {
    McpRouter::new()
        .tool(list_expiring_resources(state.clone()))
        // Write Operations
        .tool(cleanup_expired_instances(state.clone()))
        .tool(cleanup_expired_services(state.clone()))
        .tool(cleanup_all_expired_resources(state))
}
