//! Cross-service aggregation: listing, summary and search

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::compute::zone_of;
use super::invalid;
use crate::compute::Instance;
use crate::context::CloudContext;
use crate::error::CoreError;
use crate::result::OperationResult;
use crate::run::Service;

pub const COMPUTE_INSTANCE: &str = "compute_instance";
pub const CLOUD_RUN_SERVICE: &str = "cloud_run_service";

/// A resource of either group in a common shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub resource_type: String,
    pub name: String,
    /// Zone for instances, region for services
    pub location: String,
    pub status: String,
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// External IP or service URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ResourceRecord {
    pub fn from_instance(instance: &Instance, zone: &str) -> Self {
        Self {
            resource_type: COMPUTE_INSTANCE.to_string(),
            name: instance.name.clone(),
            location: zone_of(instance, zone).to_string(),
            status: instance.status.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
            labels: instance.labels.clone(),
            tags: instance.network_tags().to_vec(),
            endpoint: instance.external_ip().map(str::to_string),
        }
    }

    pub fn from_service(service: &Service, region: &str) -> Self {
        Self {
            resource_type: CLOUD_RUN_SERVICE.to_string(),
            name: service.short_name().to_string(),
            location: region.to_string(),
            status: service.status().to_string(),
            labels: service.labels.clone(),
            tags: Vec::new(),
            endpoint: service.uri.clone(),
        }
    }

    /// Case-insensitive substring match on name, label keys/values and tags.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.labels.iter().any(|(k, v)| {
                k.to_lowercase().contains(needle) || v.to_lowercase().contains(needle)
            })
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// A group that could not be listed while the other one could
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub resource_type: String,
    pub location: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceCounts {
    pub total_resources: usize,
    pub total_compute_instances: usize,
    pub total_cloud_run_services: usize,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllResources {
    pub resources: Vec<ResourceRecord>,
    pub summary: ResourceCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_failures: Vec<PartialFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeCounts {
    pub total_instances: usize,
    pub running: usize,
    pub stopped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total_services: usize,
    pub active: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub project_id: String,
    pub zone: String,
    pub region: String,
    pub compute_engine: ComputeCounts,
    pub cloud_run: RunCounts,
    /// RFC 3339
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_failures: Vec<PartialFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub matches: Vec<ResourceRecord>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_failures: Vec<PartialFailure>,
}

/// Raw listing of both groups, fetched concurrently
struct Inventory {
    zone: String,
    region: String,
    instances: Result<Vec<Instance>, CoreError>,
    services: Result<Vec<Service>, CoreError>,
}

impl Inventory {
    async fn fetch(ctx: &CloudContext, zone: Option<&str>, region: Option<&str>) -> Self {
        let zone = ctx.settings().zone_or_default(zone).to_string();
        let region = ctx.settings().region_or_default(region).to_string();

        let (instances, services) = futures::join!(
            ctx.compute().list_instances(&zone),
            ctx.run().list_services(&region)
        );

        Self {
            zone,
            region,
            instances,
            services,
        }
    }

    /// Both groups failed; the error names each failure
    fn total_failure(&self) -> Option<String> {
        match (&self.instances, &self.services) {
            (Err(a), Err(b)) => Some(format!(
                "compute instances in {}: {}; cloud run services in {}: {}",
                self.zone, a, self.region, b
            )),
            _ => None,
        }
    }

    fn partial_failures(&self) -> Vec<PartialFailure> {
        let mut failures = Vec::new();
        if let Err(e) = &self.instances {
            warn!(
                zone = %self.zone,
                error = %e,
                "Instance listing failed, continuing with services"
            );
            failures.push(PartialFailure {
                resource_type: COMPUTE_INSTANCE.to_string(),
                location: self.zone.clone(),
                error: e.to_string(),
            });
        }
        if let Err(e) = &self.services {
            warn!(
                region = %self.region,
                error = %e,
                "Service listing failed, continuing with instances"
            );
            failures.push(PartialFailure {
                resource_type: CLOUD_RUN_SERVICE.to_string(),
                location: self.region.clone(),
                error: e.to_string(),
            });
        }
        failures
    }

    fn instances(&self) -> &[Instance] {
        self.instances.as_deref().unwrap_or(&[])
    }

    fn services(&self) -> &[Service] {
        self.services.as_deref().unwrap_or(&[])
    }

    fn records(&self) -> Vec<ResourceRecord> {
        self.instances()
            .iter()
            .map(|i| ResourceRecord::from_instance(i, &self.zone))
            .chain(
                self.services()
                    .iter()
                    .map(|s| ResourceRecord::from_service(s, &self.region)),
            )
            .collect()
    }
}

fn all_failed<T>(action: &str, project_id: &str, error: String) -> OperationResult<T> {
    tracing::error!(action, project_id, error = %error, "Operation failed");
    OperationResult::error(format!("Failed to {} for project {}", action, project_id), error)
        .with_context("project_id", project_id)
}

pub async fn list_all_resources(
    ctx: &CloudContext,
    zone: Option<&str>,
    region: Option<&str>,
) -> OperationResult<AllResources> {
    info!(project_id = ctx.project_id(), "Listing all resources");
    let inventory = Inventory::fetch(ctx, zone, region).await;
    if let Some(error) = inventory.total_failure() {
        return all_failed("list resources", ctx.project_id(), error);
    }

    let resources = inventory.records();
    let summary = ResourceCounts {
        total_resources: resources.len(),
        total_compute_instances: inventory.instances().len(),
        total_cloud_run_services: inventory.services().len(),
        project_id: ctx.project_id().to_string(),
    };
    let partial_failures = inventory.partial_failures();

    let message = if partial_failures.is_empty() {
        format!("Found {} resources", summary.total_resources)
    } else {
        format!(
            "Found {} resources ({} group(s) could not be listed)",
            summary.total_resources,
            partial_failures.len()
        )
    };

    OperationResult::success(
        message,
        AllResources {
            resources,
            summary,
            partial_failures,
        },
    )
}

pub async fn get_resource_summary(
    ctx: &CloudContext,
    zone: Option<&str>,
    region: Option<&str>,
) -> OperationResult<ResourceSummary> {
    info!(project_id = ctx.project_id(), "Generating resource summary");
    let inventory = Inventory::fetch(ctx, zone, region).await;
    if let Some(error) = inventory.total_failure() {
        return all_failed("summarize resources", ctx.project_id(), error);
    }

    let instances = inventory.instances();
    let compute_engine = ComputeCounts {
        total_instances: instances.len(),
        running: instances
            .iter()
            .filter(|i| i.status.as_deref() == Some("RUNNING"))
            .count(),
        stopped: instances
            .iter()
            .filter(|i| {
                matches!(
                    i.status.as_deref(),
                    Some("TERMINATED" | "STOPPED" | "STOPPING" | "SUSPENDED")
                )
            })
            .count(),
    };

    let services = inventory.services();
    let cloud_run = RunCounts {
        total_services: services.len(),
        active: services.iter().filter(|s| s.status() == "Ready").count(),
    };

    let partial_failures = inventory.partial_failures();
    OperationResult::success(
        format!(
            "{} instances ({} running), {} services ({} active)",
            compute_engine.total_instances,
            compute_engine.running,
            cloud_run.total_services,
            cloud_run.active
        ),
        ResourceSummary {
            project_id: ctx.project_id().to_string(),
            zone: inventory.zone.clone(),
            region: inventory.region.clone(),
            compute_engine,
            cloud_run,
            timestamp: Utc::now().to_rfc3339(),
            partial_failures,
        },
    )
}

pub async fn search_resources(
    ctx: &CloudContext,
    query: &str,
    zone: Option<&str>,
    region: Option<&str>,
) -> OperationResult<SearchResults> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return invalid("search", "resources", "search query must not be empty");
    }

    info!(query = %needle, "Searching resources");
    let inventory = Inventory::fetch(ctx, zone, region).await;
    if let Some(error) = inventory.total_failure() {
        return all_failed("search resources", ctx.project_id(), error);
    }

    let matches: Vec<ResourceRecord> = inventory
        .records()
        .into_iter()
        .filter(|r| r.matches(&needle))
        .collect();
    let count = matches.len();

    OperationResult::success(
        format!("Found {} resources matching '{}'", count, query.trim()),
        SearchResults {
            query: query.trim().to_string(),
            matches,
            count,
            partial_failures: inventory.partial_failures(),
        },
    )
}
