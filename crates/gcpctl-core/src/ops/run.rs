//! Cloud Run service operations

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{failure, invalid, require_name};
use crate::context::CloudContext;
use crate::labels::{self, DEFAULT_TTL};
use crate::lifecycle::Ttl;
use crate::result::OperationResult;
use crate::run::types::short_name;
use crate::run::{
    Container, EnvVar, Operation, ResourceRequirements, RevisionScaling, RevisionTemplate,
    Service, TrafficTarget,
};

pub const DEFAULT_MEMORY: &str = "512Mi";
pub const DEFAULT_CPU: &str = "1";
pub const DEFAULT_MIN_INSTANCES: u32 = 0;
pub const DEFAULT_MAX_INSTANCES: u32 = 100;

/// Traffic key that targets the latest ready revision
pub const LATEST_REVISION: &str = "LATEST";

/// Normalized traffic entry: a revision name (or `LATEST`) and its share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficAllocation {
    pub revision: String,
    pub percent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl TrafficAllocation {
    fn from_target(target: &TrafficTarget) -> Self {
        let revision = if target.is_latest() {
            LATEST_REVISION.to_string()
        } else {
            target
                .revision
                .as_deref()
                .map(short_name)
                .unwrap_or(LATEST_REVISION)
                .to_string()
        };
        Self {
            revision,
            percent: target.percent,
            tag: target.tag.clone(),
        }
    }

    fn to_target(&self) -> TrafficTarget {
        let mut target = if self.revision == LATEST_REVISION {
            TrafficTarget::latest(self.percent)
        } else {
            TrafficTarget::revision(self.revision.clone(), self.percent)
        };
        target.tag = self.tag.clone();
        target
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub name: String,
    pub region: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_ready_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl ServiceSummary {
    pub fn from_service(service: &Service, region: &str) -> Self {
        Self {
            name: service.short_name().to_string(),
            region: region.to_string(),
            status: service.status().to_string(),
            url: service.uri.clone(),
            image: service.image().map(str::to_string),
            latest_ready_revision: service
                .latest_ready_revision
                .as_deref()
                .map(|r| short_name(r).to_string()),
            last_updated: service.update_time.clone(),
            labels: service.labels.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceList {
    pub region: String,
    pub services: Vec<ServiceSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOperation {
    pub operation_id: String,
    pub service_name: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedService {
    pub operation_id: String,
    pub service_name: String,
    pub region: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub name: String,
    pub region: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    /// Names only; values are not echoed back
    pub env_vars: Vec<String>,
    pub traffic: Vec<TrafficAllocation>,
    /// Revisions currently serving or most recently created
    pub revisions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_ready_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_created_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_message: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl ServiceDetails {
    fn from_service(service: &Service, region: &str) -> Self {
        let container = service.template.as_ref().and_then(|t| t.containers.first());
        let limits = container.and_then(|c| c.resources.as_ref()).map(|r| &r.limits);
        let scaling = service.template.as_ref().and_then(|t| t.scaling.as_ref());

        let latest_ready = service
            .latest_ready_revision
            .as_deref()
            .map(|r| short_name(r).to_string());
        let latest_created = service
            .latest_created_revision
            .as_deref()
            .map(|r| short_name(r).to_string());

        let mut revisions: Vec<String> = service
            .traffic_statuses
            .iter()
            .filter_map(|s| s.revision.as_deref())
            .map(|r| short_name(r).to_string())
            .chain(latest_ready.clone())
            .chain(latest_created.clone())
            .collect();
        revisions.sort();
        revisions.dedup();

        // Prefer the observed split over the requested one
        let traffic = if service.traffic_statuses.is_empty() {
            service.traffic.iter().map(TrafficAllocation::from_target).collect()
        } else {
            service
                .traffic_statuses
                .iter()
                .map(|s| TrafficAllocation {
                    revision: s
                        .revision
                        .as_deref()
                        .map(short_name)
                        .unwrap_or(LATEST_REVISION)
                        .to_string(),
                    percent: s.percent,
                    tag: s.tag.clone(),
                })
                .collect()
        };

        Self {
            name: service.short_name().to_string(),
            region: region.to_string(),
            status: service.status().to_string(),
            url: service.uri.clone(),
            image: service.image().map(str::to_string),
            memory: limits.and_then(|l| l.get("memory").cloned()),
            cpu: limits.and_then(|l| l.get("cpu").cloned()),
            min_instances: scaling.and_then(|s| s.min_instance_count),
            max_instances: scaling.and_then(|s| s.max_instance_count),
            env_vars: container
                .map(|c| c.env.iter().map(|e| e.name.clone()).collect())
                .unwrap_or_default(),
            traffic,
            revisions,
            latest_ready_revision: latest_ready,
            latest_created_revision: latest_created,
            created: service.create_time.clone(),
            last_updated: service.update_time.clone(),
            condition_message: service
                .terminal_condition
                .as_ref()
                .and_then(|c| c.message.clone()),
            labels: service.labels.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetailsResult {
    pub service: ServiceDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficUpdate {
    pub operation_id: String,
    pub service_name: String,
    pub region: String,
    pub traffic: Vec<TrafficAllocation>,
}

/// Inputs of `deploy_service`
#[derive(Debug, Clone, PartialEq)]
pub struct DeployServiceParams {
    pub service_name: String,
    pub image: String,
    pub region: Option<String>,
    pub memory: String,
    pub cpu: String,
    pub min_instances: u32,
    pub max_instances: u32,
    pub env_vars: Option<BTreeMap<String, String>>,
    pub labels: Option<BTreeMap<String, String>>,
    pub ttl: String,
}

impl DeployServiceParams {
    pub fn new(service_name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            image: image.into(),
            region: None,
            memory: DEFAULT_MEMORY.to_string(),
            cpu: DEFAULT_CPU.to_string(),
            min_instances: DEFAULT_MIN_INSTANCES,
            max_instances: DEFAULT_MAX_INSTANCES,
            env_vars: None,
            labels: None,
            ttl: DEFAULT_TTL.to_string(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        require_name("Service", &self.service_name)?;
        if self.image.trim().is_empty() {
            return Err("image must not be empty".to_string());
        }
        if self.min_instances > self.max_instances {
            return Err(format!(
                "min_instances ({}) must not exceed max_instances ({})",
                self.min_instances, self.max_instances
            ));
        }
        self.ttl.parse::<Ttl>().map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Check a revision -> percent split and normalize it.
///
/// Every share must be within 0..=100 and the shares must sum to exactly 100.
pub fn validate_traffic(
    revisions: &BTreeMap<String, i64>,
) -> Result<Vec<TrafficAllocation>, String> {
    if revisions.is_empty() {
        return Err("at least one revision must receive traffic".to_string());
    }

    let mut total = 0i64;
    let mut seen = BTreeSet::new();
    let mut allocations = Vec::with_capacity(revisions.len());
    for (revision, percent) in revisions {
        let revision = revision.trim();
        if revision.is_empty() {
            return Err("revision names must not be empty".to_string());
        }
        let percent = u32::try_from(*percent)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| {
                format!(
                    "traffic percent for {} must be between 0 and 100, got {}",
                    revision, percent
                )
            })?;
        total += i64::from(percent);

        let revision = if revision.eq_ignore_ascii_case(LATEST_REVISION) {
            LATEST_REVISION.to_string()
        } else {
            revision.to_string()
        };
        if !seen.insert(revision.clone()) {
            return Err(format!("revision {} appears more than once", revision));
        }
        allocations.push(TrafficAllocation {
            revision,
            percent,
            tag: None,
        });
    }

    if total != 100 {
        return Err(format!("traffic percentages must sum to 100, got {}", total));
    }
    Ok(allocations)
}

fn lro_result<T>(
    operation: &Operation,
    done_message: String,
    pending_message: String,
    resource: &str,
    details: T,
) -> OperationResult<T> {
    if let Some(error) = operation.error_message() {
        return OperationResult::error(format!("Operation on {} failed", resource), error)
            .with_context("operation_id", operation.name.clone());
    }
    if operation.done {
        OperationResult::success(done_message, details)
    } else {
        OperationResult::pending(pending_message, details)
    }
}

pub async fn list_services(
    ctx: &CloudContext,
    region: Option<&str>,
) -> OperationResult<ServiceList> {
    let region = ctx.settings().region_or_default(region).to_string();
    info!(region = %region, "Listing Cloud Run services");

    match ctx.run().list_services(&region).await {
        Ok(services) => {
            let services: Vec<ServiceSummary> = services
                .iter()
                .map(|s| ServiceSummary::from_service(s, &region))
                .collect();
            let count = services.len();
            OperationResult::success(
                format!("Found {} services in region {}", count, region),
                ServiceList {
                    region,
                    services,
                    count,
                },
            )
        }
        Err(e) => failure::<ServiceList>("list services in region", &region, &e)
            .with_context("region", region.clone()),
    }
}

pub async fn deploy_service(
    ctx: &CloudContext,
    params: &DeployServiceParams,
) -> OperationResult<DeployedService> {
    let settings = ctx.settings();
    let region = settings.region_or_default(params.region.as_deref()).to_string();
    let name = params.service_name.as_str();
    let resource = format!("service {}", name);

    if let Err(reason) = params.validate() {
        return invalid::<DeployedService>("deploy", &resource, reason)
            .with_context("service_name", name);
    }

    let labels = labels::merge_labels(
        params.labels.iter().flatten(),
        &params.ttl,
        settings.resource_owner.as_deref(),
        Utc::now(),
    );

    let limits: BTreeMap<String, String> = [
        ("memory".to_string(), params.memory.clone()),
        ("cpu".to_string(), params.cpu.clone()),
    ]
    .into_iter()
    .collect();

    let body = Service {
        labels: labels.clone(),
        template: Some(RevisionTemplate {
            scaling: Some(RevisionScaling {
                min_instance_count: Some(params.min_instances),
                max_instance_count: Some(params.max_instances),
            }),
            containers: vec![Container {
                image: params.image.clone(),
                env: params
                    .env_vars
                    .iter()
                    .flatten()
                    .map(|(k, v)| EnvVar {
                        name: k.clone(),
                        value: Some(v.clone()),
                    })
                    .collect(),
                resources: Some(ResourceRequirements { limits }),
            }],
            ..Default::default()
        }),
        ..Default::default()
    };

    info!(service = name, region = %region, image = %params.image, "Deploying service");
    let _guard = ctx.locks().acquire("service", &region, name).await;
    match ctx.run().create_or_update_service(&region, name, &body).await {
        Ok(operation) => {
            let url = if operation.error_message().is_none() {
                service_url(ctx, &region, name).await
            } else {
                None
            };
            lro_result(
                &operation,
                format!("Service {} deployed", name),
                format!("Service {} deployment started", name),
                &resource,
                DeployedService {
                    operation_id: operation.name.clone(),
                    service_name: name.to_string(),
                    region,
                    image: params.image.clone(),
                    labels,
                    url,
                },
            )
        }
        Err(e) => failure::<DeployedService>("deploy", &resource, &e)
            .with_context("service_name", name)
            .with_context("region", region),
    }
}

/// Public URL of a service once Cloud Run has assigned one.
///
/// A brand new service has no URL until its first revision is serving.
async fn service_url(ctx: &CloudContext, region: &str, name: &str) -> Option<String> {
    match ctx.run().get_service(region, name).await {
        Ok(service) => service.uri.filter(|uri| !uri.is_empty()),
        Err(e) => {
            debug!(service = name, region, error = %e, "Service URL not available yet");
            None
        }
    }
}

pub async fn delete_service(
    ctx: &CloudContext,
    service_name: &str,
    region: Option<&str>,
) -> OperationResult<ServiceOperation> {
    let region = ctx.settings().region_or_default(region).to_string();
    let resource = format!("service {}", service_name);
    if let Err(reason) = require_name("Service", service_name) {
        return invalid("delete", &resource, reason);
    }

    info!(service = service_name, region = %region, "Deleting service");
    let _guard = ctx.locks().acquire("service", &region, service_name).await;
    match ctx.run().delete_service(&region, service_name).await {
        Ok(operation) => lro_result(
            &operation,
            format!("Service {} deleted", service_name),
            format!("Service {} deletion started", service_name),
            &resource,
            ServiceOperation {
                operation_id: operation.name.clone(),
                service_name: service_name.to_string(),
                region,
            },
        ),
        Err(e) => failure::<ServiceOperation>("delete", &resource, &e)
            .with_context("service_name", service_name)
            .with_context("region", region),
    }
}

pub async fn get_service_details(
    ctx: &CloudContext,
    service_name: &str,
    region: Option<&str>,
) -> OperationResult<ServiceDetailsResult> {
    let region = ctx.settings().region_or_default(region).to_string();
    let resource = format!("service {}", service_name);
    if let Err(reason) = require_name("Service", service_name) {
        return invalid("describe", &resource, reason);
    }

    info!(service = service_name, region = %region, "Getting service details");
    match ctx.run().get_service(&region, service_name).await {
        Ok(service) => OperationResult::success(
            format!("Retrieved details for service {}", service_name),
            ServiceDetailsResult {
                service: ServiceDetails::from_service(&service, &region),
            },
        ),
        Err(e) => failure::<ServiceDetailsResult>("describe", &resource, &e)
            .with_context("service_name", service_name)
            .with_context("region", region),
    }
}

pub async fn update_traffic(
    ctx: &CloudContext,
    service_name: &str,
    revisions: &BTreeMap<String, i64>,
    region: Option<&str>,
) -> OperationResult<TrafficUpdate> {
    let region = ctx.settings().region_or_default(region).to_string();
    let resource = format!("service {}", service_name);
    if let Err(reason) = require_name("Service", service_name) {
        return invalid("update traffic for", &resource, reason);
    }

    let allocations = match validate_traffic(revisions) {
        Ok(allocations) => allocations,
        Err(reason) => {
            return invalid::<TrafficUpdate>("update traffic for", &resource, reason)
                .with_context("service_name", service_name);
        }
    };

    let body = Service {
        traffic: allocations.iter().map(TrafficAllocation::to_target).collect(),
        ..Default::default()
    };

    info!(
        service = service_name,
        region = %region,
        targets = allocations.len(),
        "Updating traffic split"
    );
    let _guard = ctx.locks().acquire("service", &region, service_name).await;
    match ctx.run().update_traffic(&region, service_name, &body).await {
        Ok(operation) => lro_result(
            &operation,
            format!("Traffic updated for service {}", service_name),
            format!("Traffic update started for service {}", service_name),
            &resource,
            TrafficUpdate {
                operation_id: operation.name.clone(),
                service_name: service_name.to_string(),
                region,
                traffic: allocations,
            },
        ),
        Err(e) => failure::<TrafficUpdate>("update traffic for", &resource, &e)
            .with_context("service_name", service_name)
            .with_context("region", region),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn split(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_validate_traffic_accepts_full_split() {
        let allocations =
            validate_traffic(&split(&[("web-00001-abc", 80), ("latest", 20)])).unwrap();
        assert_eq!(
            allocations,
            vec![
                TrafficAllocation {
                    revision: "LATEST".to_string(),
                    percent: 20,
                    tag: None
                },
                TrafficAllocation {
                    revision: "web-00001-abc".to_string(),
                    percent: 80,
                    tag: None
                },
            ]
        );
    }

    #[test]
    fn test_validate_traffic_rejects_bad_sums() {
        let err = validate_traffic(&split(&[("a", 50), ("b", 40)])).unwrap_err();
        assert!(err.contains("sum to 100, got 90"));
        assert!(validate_traffic(&split(&[("a", 60), ("b", 60)])).is_err());
        assert!(validate_traffic(&BTreeMap::new()).is_err());
    }

    #[test]
    fn test_validate_traffic_rejects_out_of_range() {
        let err = validate_traffic(&split(&[("a", 120), ("b", -20)])).unwrap_err();
        assert!(err.contains("between 0 and 100"));
        assert!(validate_traffic(&split(&[("", 100)])).is_err());
    }

    #[test]
    fn test_validate_traffic_rejects_duplicate_latest() {
        let err = validate_traffic(&split(&[("latest", 50), ("LATEST", 50)])).unwrap_err();
        assert!(err.contains("LATEST appears more than once"));
        assert!(validate_traffic(&split(&[("a", 50), (" a", 50)])).is_err());
    }

    #[test]
    fn test_traffic_allocation_targets() {
        let latest = TrafficAllocation {
            revision: "LATEST".to_string(),
            percent: 100,
            tag: None,
        };
        assert!(latest.to_target().is_latest());
        assert_eq!(TrafficAllocation::from_target(&latest.to_target()), latest);

        let pinned = TrafficTarget::revision("projects/p/locations/r/revisions/web-00002", 10);
        assert_eq!(TrafficAllocation::from_target(&pinned).revision, "web-00002");
    }

    #[test]
    fn test_deploy_params_validation() {
        let mut params = DeployServiceParams::new("web", "gcr.io/demo/web:1");
        assert!(params.validate().is_ok());
        assert_eq!(params.memory, "512Mi");
        assert_eq!(params.max_instances, 100);

        params.min_instances = 5;
        params.max_instances = 2;
        assert!(params.validate().unwrap_err().contains("min_instances"));

        let mut params = DeployServiceParams::new("web", "gcr.io/demo/web:1");
        params.ttl = "forever".to_string();
        assert!(params.validate().unwrap_err().contains("Invalid TTL"));
    }
}
