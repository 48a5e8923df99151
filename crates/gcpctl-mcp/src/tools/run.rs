//! Cloud Run service tools

use std::collections::BTreeMap;
use std::sync::Arc;

use gcpctl_core::labels::DEFAULT_TTL;
use gcpctl_core::ops::run::{
    self, DEFAULT_CPU, DEFAULT_MAX_INSTANCES, DEFAULT_MEMORY, DEFAULT_MIN_INSTANCES,
    DeployServiceParams,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tower_mcp::extract::{Json, State};
use tower_mcp::{McpRouter, Tool, ToolBuilder};

use super::{reply, require_write};
use crate::state::AppState;

fn default_memory() -> String {
    DEFAULT_MEMORY.to_string()
}

fn default_cpu() -> String {
    DEFAULT_CPU.to_string()
}

fn default_min_instances() -> u32 {
    DEFAULT_MIN_INSTANCES
}

fn default_max_instances() -> u32 {
    DEFAULT_MAX_INSTANCES
}

fn default_ttl() -> String {
    DEFAULT_TTL.to_string()
}

/// Input for listing services
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListServicesInput {
    /// Region to list services from. Defaults to the configured region.
    #[serde(default)]
    pub region: Option<String>,
}

/// Build the list_services tool
pub fn list_services(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("list_services")
        .description(
            "List all Cloud Run services in a region. Returns name, URL, readiness, \
             image, latest ready revision and labels.",
        )
        .read_only()
        .idempotent()
        .extractor_handler_typed::<_, _, _, ListServicesInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<ListServicesInput>| async move {
                let result = run::list_services(state.context(), input.region.as_deref()).await;
                reply(&result)
            },
        )
        .build()
}

/// Input for tools addressing a single service
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ServiceInput {
    /// Name of the service
    pub service_name: String,
    /// Region where the service runs. Defaults to the configured region.
    #[serde(default)]
    pub region: Option<String>,
}

/// Input for deploying a service
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeployServiceInput {
    /// Name of the service to create or update
    pub service_name: String,
    /// Container image, e.g. "us-docker.pkg.dev/cloudrun/container/hello"
    pub image: String,
    /// Region to deploy to. Defaults to the configured region.
    #[serde(default)]
    pub region: Option<String>,
    /// Memory limit (default: 512Mi)
    #[serde(default = "default_memory")]
    pub memory: String,
    /// CPU limit (default: 1)
    #[serde(default = "default_cpu")]
    pub cpu: String,
    /// Minimum number of instances (default: 0)
    #[serde(default = "default_min_instances")]
    pub min_instances: u32,
    /// Maximum number of instances (default: 100)
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
    /// Environment variables for the container
    #[serde(default)]
    pub env_vars: Option<BTreeMap<String, String>>,
    /// Extra labels. managed-by and created-at are always set by the server.
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    /// Time to live: "7d", "24h" or "never" (default: 7d)
    #[serde(default = "default_ttl")]
    pub ttl: String,
}

impl From<DeployServiceInput> for DeployServiceParams {
    fn from(input: DeployServiceInput) -> Self {
        Self {
            service_name: input.service_name,
            image: input.image,
            region: input.region,
            memory: input.memory,
            cpu: input.cpu,
            min_instances: input.min_instances,
            max_instances: input.max_instances,
            env_vars: input.env_vars,
            labels: input.labels,
            ttl: input.ttl,
        }
    }
}

/// Build the deploy_service tool
pub fn deploy_service(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("deploy_service")
        .description(
            "Deploy a container image to Cloud Run, creating the service if it does not exist \
             and rolling out a new revision otherwise. Requires write permission.",
        )
        .non_destructive()
        .idempotent()
        .extractor_handler_typed::<_, _, _, DeployServiceInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<DeployServiceInput>| async move {
                require_write(&state)?;
                let params = DeployServiceParams::from(input);
                let result = run::deploy_service(state.context(), &params).await;
                reply(&result)
            },
        )
        .build()
}

/// Build the delete_service tool
pub fn delete_service(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("delete_service")
        .description(
            "Delete a Cloud Run service and all of its revisions. \
             This is a destructive operation. Requires write permission.",
        )
        .destructive()
        .extractor_handler_typed::<_, _, _, ServiceInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<ServiceInput>| async move {
                require_write(&state)?;
                let result = run::delete_service(
                    state.context(),
                    &input.service_name,
                    input.region.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Build the get_service_details tool
pub fn get_service_details(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("get_service_details")
        .description(
            "Get detailed information about a Cloud Run service: URL, readiness, image, \
             resource limits, scaling, environment variable names, traffic split and revisions.",
        )
        .read_only()
        .idempotent()
        .extractor_handler_typed::<_, _, _, ServiceInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<ServiceInput>| async move {
                let result = run::get_service_details(
                    state.context(),
                    &input.service_name,
                    input.region.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Input for updating a traffic split
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTrafficInput {
    /// Name of the service
    pub service_name: String,
    /// Revision name to percent, e.g. {"web-00002-abc": 90, "LATEST": 10}.
    /// Percentages must sum to 100. The key LATEST follows the latest ready revision.
    pub revisions: BTreeMap<String, i64>,
    /// Region where the service runs. Defaults to the configured region.
    #[serde(default)]
    pub region: Option<String>,
}

/// Build the update_traffic tool
pub fn update_traffic(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("update_traffic")
        .description(
            "Split traffic of a Cloud Run service between revisions. Each percentage must be \
             between 0 and 100 and they must sum to 100. Requires write permission.",
        )
        .non_destructive()
        .idempotent()
        .extractor_handler_typed::<_, _, _, UpdateTrafficInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<UpdateTrafficInput>| async move {
                require_write(&state)?;
                let result = run::update_traffic(
                    state.context(),
                    &input.service_name,
                    &input.revisions,
                    input.region.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

pub const INSTRUCTIONS: &str = r#"
### Cloud Run
- list_services: List services in a region
- get_service_details: Get service configuration, traffic split and revisions

### Cloud Run - Write Operations (hidden with --read-only)
- deploy_service: Create or update a service from a container image
- update_traffic: Split traffic between revisions (must sum to 100)
- delete_service: Delete a service
"#;

/// Build an MCP sub-router containing the Cloud Run tools
pub fn router(state: Arc<AppState>) -> McpRouter {
    McpRouter::new()
        .tool(list_services(state.clone()))
        .tool(get_service_details(state.clone()))
        // Write Operations
        .tool(deploy_service(state.clone()))
        .tool(update_traffic(state.clone()))
        .tool(delete_service(state))
}
