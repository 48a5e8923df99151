//! Compute Engine VM tools

use std::collections::BTreeMap;
use std::sync::Arc;

use gcpctl_core::labels::DEFAULT_TTL;
use gcpctl_core::ops::compute::{
    self, CreateInstanceParams, DEFAULT_DISK_SIZE_GB, DEFAULT_IMAGE_FAMILY, DEFAULT_IMAGE_PROJECT,
    DEFAULT_MACHINE_TYPE,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tower_mcp::extract::{Json, State};
use tower_mcp::{McpRouter, Tool, ToolBuilder};

use super::{reply, require_write};
use crate::state::AppState;

fn default_machine_type() -> String {
    DEFAULT_MACHINE_TYPE.to_string()
}

fn default_image_family() -> String {
    DEFAULT_IMAGE_FAMILY.to_string()
}

fn default_image_project() -> String {
    DEFAULT_IMAGE_PROJECT.to_string()
}

fn default_disk_size_gb() -> u32 {
    DEFAULT_DISK_SIZE_GB
}

fn default_ttl() -> String {
    DEFAULT_TTL.to_string()
}

/// Input for listing instances
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListInstancesInput {
    /// Zone to list instances from. Defaults to the configured zone.
    #[serde(default)]
    pub zone: Option<String>,
}

/// Build the list_instances tool
pub fn list_instances(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("list_instances")
        .description(
            "List all Compute Engine VM instances in a zone. Returns name, status, \
             machine type, internal and external IP addresses, labels and network tags.",
        )
        .read_only()
        .idempotent()
        .extractor_handler_typed::<_, _, _, ListInstancesInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<ListInstancesInput>| async move {
                let result = compute::list_instances(state.context(), input.zone.as_deref()).await;
                reply(&result)
            },
        )
        .build()
}

/// Input for tools addressing a single instance
#[derive(Debug, Deserialize, JsonSchema)]
pub struct InstanceInput {
    /// Name of the instance
    pub instance_name: String,
    /// Zone where the instance is located. Defaults to the configured zone.
    #[serde(default)]
    pub zone: Option<String>,
}

/// Build the start_instance tool
pub fn start_instance(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("start_instance")
        .description(
            "Start a stopped Compute Engine VM instance. Returns the operation id; \
             status is 'pending' until the provider finishes. Requires write permission.",
        )
        .non_destructive()
        .idempotent()
        .extractor_handler_typed::<_, _, _, InstanceInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<InstanceInput>| async move {
                require_write(&state)?;
                let result = compute::start_instance(
                    state.context(),
                    &input.instance_name,
                    input.zone.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Build the stop_instance tool
pub fn stop_instance(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("stop_instance")
        .description(
            "Stop a running Compute Engine VM instance. Returns the operation id; \
             status is 'pending' until the provider finishes. Requires write permission.",
        )
        .non_destructive()
        .idempotent()
        .extractor_handler_typed::<_, _, _, InstanceInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<InstanceInput>| async move {
                require_write(&state)?;
                let result = compute::stop_instance(
                    state.context(),
                    &input.instance_name,
                    input.zone.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Build the get_instance_details tool
pub fn get_instance_details(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("get_instance_details")
        .description(
            "Get detailed information about a Compute Engine VM instance: status, machine type, \
             internal and external IPs, disks, labels, network tags and metadata keys.",
        )
        .read_only()
        .idempotent()
        .extractor_handler_typed::<_, _, _, InstanceInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<InstanceInput>| async move {
                let result = compute::get_instance_details(
                    state.context(),
                    &input.instance_name,
                    input.zone.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

/// Input for creating an instance
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateInstanceInput {
    /// Name for the new instance
    pub instance_name: String,
    /// Zone where to create the instance. Defaults to the configured zone.
    #[serde(default)]
    pub zone: Option<String>,
    /// Machine type (default: e2-micro)
    #[serde(default = "default_machine_type")]
    pub machine_type: String,
    /// OS image family (default: debian-12)
    #[serde(default = "default_image_family")]
    pub image_family: String,
    /// Project containing the image family (default: debian-cloud)
    #[serde(default = "default_image_project")]
    pub image_project: String,
    /// Boot disk size in GB (default: 10)
    #[serde(default = "default_disk_size_gb")]
    pub disk_size_gb: u32,
    /// SSH public key to install, e.g. "ssh-ed25519 AAAA... user@host"
    #[serde(default)]
    pub ssh_public_key: Option<String>,
    /// Login name for the SSH key (default: gcp-user)
    #[serde(default)]
    pub ssh_username: Option<String>,
    /// Extra labels. managed-by and created-at are always set by the server.
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    /// Time to live: "7d", "24h" or "never" (default: 7d)
    #[serde(default = "default_ttl")]
    pub ttl: String,
    /// Network tags, used to target firewall rules
    #[serde(default)]
    pub network_tags: Option<Vec<String>>,
}

impl From<CreateInstanceInput> for CreateInstanceParams {
    fn from(input: CreateInstanceInput) -> Self {
        Self {
            instance_name: input.instance_name,
            zone: input.zone,
            machine_type: input.machine_type,
            image_family: input.image_family,
            image_project: input.image_project,
            disk_size_gb: input.disk_size_gb,
            ssh_public_key: input.ssh_public_key,
            ssh_username: input.ssh_username,
            labels: input.labels,
            ttl: input.ttl,
            network_tags: input.network_tags.unwrap_or_default(),
        }
    }
}

/// Build the create_instance tool
pub fn create_instance(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("create_instance")
        .description(
            "Create a Compute Engine VM instance with an external IP on the default network. \
             When ssh_public_key is given it is installed for ssh_username (default gcp-user) \
             through the ssh-keys metadata entry. The instance is labeled for TTL-based cleanup. \
             Requires write permission.",
        )
        .non_destructive()
        .extractor_handler_typed::<_, _, _, CreateInstanceInput>(
            state,
            |State(state): State<Arc<AppState>>,
             Json(input): Json<CreateInstanceInput>| async move {
                require_write(&state)?;
                let params = CreateInstanceParams::from(input);
                let result = compute::create_instance(state.context(), &params).await;
                reply(&result)
            },
        )
        .build()
}

/// Build the delete_instance tool
pub fn delete_instance(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("delete_instance")
        .description(
            "Delete a Compute Engine VM instance and its auto-delete disks. \
             This is a destructive operation. Requires write permission.",
        )
        .destructive()
        .extractor_handler_typed::<_, _, _, InstanceInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<InstanceInput>| async move {
                require_write(&state)?;
                let result = compute::delete_instance(
                    state.context(),
                    &input.instance_name,
                    input.zone.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

pub const INSTRUCTIONS: &str = r#"
### Compute Engine
- list_instances: List VM instances in a zone
- get_instance_details: Get instance configuration, IPs, disks and labels

### Compute Engine - Write Operations (hidden with --read-only)
- create_instance: Create a VM, optionally installing an SSH public key
- start_instance: Start a stopped VM
- stop_instance: Stop a running VM
- delete_instance: Delete a VM
"#;

/// Build an MCP sub-router containing the Compute Engine tools
pub fn router(state: Arc<AppState>) -> McpRouter {
    McpRouter::new()
        .tool(list_instances(state.clone()))
        .tool(get_instance_details(state.clone()))
        // Write Operations
        .tool(create_instance(state.clone()))
        .tool(start_instance(state.clone()))
        .tool(stop_instance(state.clone()))
        .tool(delete_instance(state))
}
