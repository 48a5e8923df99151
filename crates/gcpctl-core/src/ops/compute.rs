//! Compute Engine VM operations

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{failure, invalid, require_name};
use crate::compute::types::short_name;
use crate::compute::{
    AccessConfig, AttachedDisk, InitializeParams, Instance, Metadata, MetadataItem,
    NetworkInterface, Operation, Tags,
};
use crate::context::CloudContext;
use crate::labels::{self, DEFAULT_TTL};
use crate::lifecycle::Ttl;
use crate::result::OperationResult;

pub const DEFAULT_MACHINE_TYPE: &str = "e2-micro";
pub const DEFAULT_IMAGE_FAMILY: &str = "debian-12";
pub const DEFAULT_IMAGE_PROJECT: &str = "debian-cloud";
pub const DEFAULT_DISK_SIZE_GB: u32 = 10;
pub const DEFAULT_SSH_USERNAME: &str = "gcp-user";
pub const SSH_KEYS_METADATA_KEY: &str = "ssh-keys";

/// One row of `list_instances`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub name: String,
    pub status: String,
    pub machine_type: String,
    pub zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ip: Option<String>,
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl InstanceSummary {
    pub fn from_instance(instance: &Instance, zone: &str) -> Self {
        Self {
            name: instance.name.clone(),
            status: instance.status.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
            machine_type: instance.machine_type_name().unwrap_or_default().to_string(),
            zone: instance.zone_name().unwrap_or(zone).to_string(),
            internal_ip: instance.internal_ip().map(str::to_string),
            external_ip: instance.external_ip().map(str::to_string),
            labels: instance.labels.clone(),
            tags: instance.network_tags().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceList {
    pub zone: String,
    pub instances: Vec<InstanceSummary>,
    pub count: usize,
}

/// Details of a start/stop/delete request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceOperation {
    pub operation_id: String,
    pub instance_name: String,
    pub zone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub boot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDetails {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: String,
    pub machine_type: String,
    pub zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ip: Option<String>,
    pub disks: Vec<DiskSummary>,
    pub labels: BTreeMap<String, String>,
    pub tags: Vec<String>,
    /// Metadata keys only; values may hold keys or startup scripts
    pub metadata_keys: Vec<String>,
}

impl InstanceDetails {
    fn from_instance(instance: &Instance, zone: &str) -> Self {
        Self {
            name: instance.name.clone(),
            id: instance.id.clone(),
            status: instance.status.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
            machine_type: instance.machine_type_name().unwrap_or_default().to_string(),
            zone: instance.zone_name().unwrap_or(zone).to_string(),
            creation_timestamp: instance.creation_timestamp.clone(),
            internal_ip: instance.internal_ip().map(str::to_string),
            external_ip: instance.external_ip().map(str::to_string),
            disks: instance
                .disks
                .iter()
                .map(|disk| DiskSummary {
                    device_name: disk.device_name.clone(),
                    boot: disk.boot.unwrap_or(false),
                    size_gb: disk.disk_size_gb.clone(),
                })
                .collect(),
            labels: instance.labels.clone(),
            tags: instance.network_tags().to_vec(),
            metadata_keys: instance
                .metadata
                .as_ref()
                .map(Metadata::keys)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDetailsResult {
    pub instance: InstanceDetails,
}

/// Inputs of `create_instance`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInstanceParams {
    pub instance_name: String,
    pub zone: Option<String>,
    pub machine_type: String,
    pub image_family: String,
    pub image_project: String,
    pub disk_size_gb: u32,
    pub ssh_public_key: Option<String>,
    pub ssh_username: Option<String>,
    pub labels: Option<BTreeMap<String, String>>,
    pub ttl: String,
    pub network_tags: Vec<String>,
}

impl CreateInstanceParams {
    /// Parameters for `instance_name` with every option at its default
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            zone: None,
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            image_family: DEFAULT_IMAGE_FAMILY.to_string(),
            image_project: DEFAULT_IMAGE_PROJECT.to_string(),
            disk_size_gb: DEFAULT_DISK_SIZE_GB,
            ssh_public_key: None,
            ssh_username: None,
            labels: None,
            ttl: DEFAULT_TTL.to_string(),
            network_tags: Vec::new(),
        }
    }

    /// `ssh-keys` metadata value, when a key was supplied
    pub fn ssh_keys_entry(&self) -> Option<String> {
        let key = self
            .ssh_public_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())?;
        let username = self
            .ssh_username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_SSH_USERNAME);
        Some(format!("{}:{}", username, key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedInstance {
    pub operation_id: String,
    pub instance_name: String,
    pub zone: String,
    pub machine_type: String,
    pub labels: BTreeMap<String, String>,
}

/// Success when the provider already finished, Pending otherwise
pub(crate) fn operation_result<T>(
    operation: &Operation,
    done_message: String,
    pending_message: String,
    resource: &str,
    details: T,
) -> OperationResult<T> {
    if operation.is_done() {
        if let Some(error) = operation.error_message() {
            return OperationResult::error(format!("Operation on {} failed", resource), error)
                .with_context("operation_id", operation.name.clone());
        }
        OperationResult::success(done_message, details)
    } else {
        OperationResult::pending(pending_message, details)
    }
}

pub async fn list_instances(
    ctx: &CloudContext,
    zone: Option<&str>,
) -> OperationResult<InstanceList> {
    let zone = ctx.settings().zone_or_default(zone).to_string();
    info!(zone = %zone, "Listing instances");

    match ctx.compute().list_instances(&zone).await {
        Ok(instances) => {
            let instances: Vec<InstanceSummary> = instances
                .iter()
                .map(|i| InstanceSummary::from_instance(i, &zone))
                .collect();
            let count = instances.len();
            OperationResult::success(
                format!("Found {} instances in zone {}", count, zone),
                InstanceList {
                    zone,
                    instances,
                    count,
                },
            )
        }
        Err(e) => failure::<InstanceList>("list instances in zone", &zone, &e)
            .with_context("zone", zone.clone()),
    }
}

pub async fn start_instance(
    ctx: &CloudContext,
    instance_name: &str,
    zone: Option<&str>,
) -> OperationResult<InstanceOperation> {
    power_action(ctx, instance_name, zone, PowerAction::Start).await
}

pub async fn stop_instance(
    ctx: &CloudContext,
    instance_name: &str,
    zone: Option<&str>,
) -> OperationResult<InstanceOperation> {
    power_action(ctx, instance_name, zone, PowerAction::Stop).await
}

#[derive(Clone, Copy)]
enum PowerAction {
    Start,
    Stop,
}

async fn power_action(
    ctx: &CloudContext,
    instance_name: &str,
    zone: Option<&str>,
    action: PowerAction,
) -> OperationResult<InstanceOperation> {
    let zone = ctx.settings().zone_or_default(zone).to_string();
    let (verb, done, doing) = match action {
        PowerAction::Start => ("start", "started", "starting"),
        PowerAction::Stop => ("stop", "stopped", "stopping"),
    };
    let resource = format!("instance {}", instance_name);

    if let Err(reason) = require_name("Instance", instance_name) {
        return invalid(verb, &resource, reason);
    }

    info!(instance = instance_name, zone = %zone, action = verb, "Changing instance power state");
    let _guard = ctx.locks().acquire("instance", &zone, instance_name).await;
    let response = match action {
        PowerAction::Start => ctx.compute().start_instance(&zone, instance_name).await,
        PowerAction::Stop => ctx.compute().stop_instance(&zone, instance_name).await,
    };

    match response {
        Ok(operation) => operation_result(
            &operation,
            format!("Instance {} {}", instance_name, done),
            format!("Instance {} is {}", instance_name, doing),
            &resource,
            InstanceOperation {
                operation_id: operation.name.clone(),
                instance_name: instance_name.to_string(),
                zone,
            },
        ),
        Err(e) => failure::<InstanceOperation>(verb, &resource, &e)
            .with_context("instance_name", instance_name)
            .with_context("zone", zone),
    }
}

pub async fn get_instance_details(
    ctx: &CloudContext,
    instance_name: &str,
    zone: Option<&str>,
) -> OperationResult<InstanceDetailsResult> {
    let zone = ctx.settings().zone_or_default(zone).to_string();
    let resource = format!("instance {}", instance_name);
    if let Err(reason) = require_name("Instance", instance_name) {
        return invalid("describe", &resource, reason);
    }

    info!(instance = instance_name, zone = %zone, "Getting instance details");
    match ctx.compute().get_instance(&zone, instance_name).await {
        Ok(instance) => OperationResult::success(
            format!("Retrieved details for instance {}", instance_name),
            InstanceDetailsResult {
                instance: InstanceDetails::from_instance(&instance, &zone),
            },
        ),
        Err(e) => failure::<InstanceDetailsResult>("describe", &resource, &e)
            .with_context("instance_name", instance_name)
            .with_context("zone", zone),
    }
}

pub async fn create_instance(
    ctx: &CloudContext,
    params: &CreateInstanceParams,
) -> OperationResult<CreatedInstance> {
    let settings = ctx.settings();
    let zone = settings.zone_or_default(params.zone.as_deref()).to_string();
    let name = params.instance_name.as_str();
    let resource = format!("instance {}", name);

    if let Err(reason) = require_name("Instance", name) {
        return invalid("create", &resource, reason);
    }
    if let Err(e) = params.ttl.parse::<Ttl>() {
        return invalid("create", &resource, e.to_string()).with_context("instance_name", name);
    }
    if params.disk_size_gb == 0 {
        return invalid("create", &resource, "disk_size_gb must be greater than zero")
            .with_context("instance_name", name);
    }

    let labels = labels::merge_labels(
        params.labels.iter().flatten(),
        &params.ttl,
        settings.resource_owner.as_deref(),
        Utc::now(),
    );

    info!(
        instance = name,
        zone = %zone,
        machine_type = %params.machine_type,
        image_family = %params.image_family,
        "Creating instance"
    );

    let image = match ctx
        .compute()
        .image_from_family(&params.image_project, &params.image_family)
        .await
    {
        Ok(image) => image,
        Err(e) => {
            let image_ref = format!(
                "image family {}/{}",
                params.image_project, params.image_family
            );
            return failure::<CreatedInstance>("resolve", &image_ref, &e)
                .with_context("instance_name", name);
        }
    };

    let mut tags: Vec<String> = params
        .network_tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();

    let body = Instance {
        name: name.to_string(),
        machine_type: Some(ctx.compute().machine_type_url(&zone, &params.machine_type)),
        disks: vec![AttachedDisk {
            boot: Some(true),
            auto_delete: Some(true),
            initialize_params: Some(InitializeParams {
                source_image: Some(image.self_link.clone()),
                disk_size_gb: Some(params.disk_size_gb.to_string()),
            }),
            ..Default::default()
        }],
        network_interfaces: vec![NetworkInterface {
            network: Some(ctx.compute().default_network()),
            access_configs: vec![AccessConfig::external_nat()],
            ..Default::default()
        }],
        labels: labels.clone(),
        tags: (!tags.is_empty()).then(|| Tags {
            fingerprint: None,
            items: tags,
        }),
        metadata: params.ssh_keys_entry().map(|entry| Metadata {
            fingerprint: None,
            items: vec![MetadataItem {
                key: SSH_KEYS_METADATA_KEY.to_string(),
                value: Some(entry),
            }],
        }),
        ..Default::default()
    };

    let _guard = ctx.locks().acquire("instance", &zone, name).await;
    match ctx.compute().insert_instance(&zone, &body).await {
        Ok(operation) => operation_result(
            &operation,
            format!("Instance {} created", name),
            format!("Instance {} creation started", name),
            &resource,
            CreatedInstance {
                operation_id: operation.name.clone(),
                instance_name: name.to_string(),
                zone,
                machine_type: params.machine_type.clone(),
                labels,
            },
        ),
        Err(e) => failure::<CreatedInstance>("create", &resource, &e)
            .with_context("instance_name", name)
            .with_context("zone", zone),
    }
}

pub async fn delete_instance(
    ctx: &CloudContext,
    instance_name: &str,
    zone: Option<&str>,
) -> OperationResult<InstanceOperation> {
    let zone = ctx.settings().zone_or_default(zone).to_string();
    let resource = format!("instance {}", instance_name);
    if let Err(reason) = require_name("Instance", instance_name) {
        return invalid("delete", &resource, reason);
    }

    info!(instance = instance_name, zone = %zone, "Deleting instance");
    let _guard = ctx.locks().acquire("instance", &zone, instance_name).await;
    match ctx.compute().delete_instance(&zone, instance_name).await {
        Ok(operation) => operation_result(
            &operation,
            format!("Instance {} deleted", instance_name),
            format!("Instance {} deletion started", instance_name),
            &resource,
            InstanceOperation {
                operation_id: operation.name.clone(),
                instance_name: instance_name.to_string(),
                zone,
            },
        ),
        Err(e) => failure::<InstanceOperation>("delete", &resource, &e)
            .with_context("instance_name", instance_name)
            .with_context("zone", zone),
    }
}

/// Zone name from an instance's `zone` URL, falling back to `default`
pub(crate) fn zone_of<'a>(instance: &'a Instance, default: &'a str) -> &'a str {
    instance.zone.as_deref().map(short_name).unwrap_or(default)
}
