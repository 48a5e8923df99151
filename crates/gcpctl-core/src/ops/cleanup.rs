//! TTL-driven cleanup of managed resources

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{compute, failure, invalid, run};
use crate::context::CloudContext;
use crate::labels::{CREATED_AT_LABEL, OWNER_LABEL, TTL_LABEL};
use crate::lifecycle::{CleanupSummary, Expiry};
use crate::result::OperationResult;

pub const DEFAULT_EXPIRATION_WINDOW_DAYS: u32 = 7;

/// Outcome of one cleanup pass over one resource group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupReport {
    pub resource_type: String,
    pub location: String,
    pub dry_run: bool,
    pub summary: CleanupSummary,
    pub deleted_resources: Vec<String>,
    pub failed_resources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ByResourceType {
    pub compute_instances: OperationResult<CleanupReport>,
    pub cloud_run_services: OperationResult<CleanupReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedCleanupReport {
    pub dry_run: bool,
    pub summary: CleanupSummary,
    pub by_resource_type: ByResourceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringResource {
    pub name: String,
    pub zone: String,
    pub created_at: String,
    pub ttl: String,
    pub expires_at: String,
    pub days_until_expiration: i64,
    pub hours_until_expiration: i64,
    pub status: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentResource {
    pub name: String,
    pub zone: String,
    pub created_at: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringResources {
    pub zone: String,
    pub days_threshold: u32,
    pub expiring_soon_count: usize,
    pub permanent_count: usize,
    pub expiring_soon: Vec<ExpiringResource>,
    pub permanent_resources: Vec<PermanentResource>,
}

/// Tally of one pass
#[derive(Default)]
struct Sweep {
    scanned: usize,
    expired: usize,
    deleted: Vec<String>,
    failed: Vec<String>,
}

impl Sweep {
    fn into_report(
        self,
        resource_type: &str,
        location: String,
        dry_run: bool,
    ) -> OperationResult<CleanupReport> {
        let summary = CleanupSummary::new(
            self.scanned,
            self.expired,
            self.deleted.len(),
            self.failed.len(),
        );
        let message = format!(
            "Cleanup complete: {} deleted, {} failed out of {} expired resources",
            summary.total_deleted, summary.total_failed, summary.total_expired
        );
        OperationResult::success(
            message,
            CleanupReport {
                resource_type: resource_type.to_string(),
                location,
                dry_run,
                summary,
                deleted_resources: self.deleted,
                failed_resources: self.failed,
            },
        )
    }
}

pub async fn cleanup_expired_instances(
    ctx: &CloudContext,
    zone: Option<&str>,
    dry_run: bool,
) -> OperationResult<CleanupReport> {
    cleanup_instances_at(ctx, zone, dry_run, Utc::now()).await
}

async fn cleanup_instances_at(
    ctx: &CloudContext,
    zone: Option<&str>,
    dry_run: bool,
    now: DateTime<Utc>,
) -> OperationResult<CleanupReport> {
    let zone = ctx.settings().zone_or_default(zone).to_string();
    info!(zone = %zone, dry_run, "Cleaning up expired instances");

    let instances = match ctx.compute().list_instances(&zone).await {
        Ok(instances) => instances,
        Err(e) => {
            return failure::<CleanupReport>("clean up instances in zone", &zone, &e)
                .with_context("resource_type", "compute_instances")
                .with_context("zone", zone.clone());
        }
    };

    let mut sweep = Sweep::default();
    for instance in &instances {
        sweep.scanned += 1;
        let expiry = Expiry::evaluate(&instance.labels, now);
        debug!(instance = %instance.name, reason = %expiry.reason(now), "Checked expiry");
        if !expiry.is_expired() {
            continue;
        }

        sweep.expired += 1;
        if dry_run {
            info!(instance = %instance.name, "[DRY RUN] Would delete instance");
            sweep.deleted.push(format!("{} (dry-run)", instance.name));
            continue;
        }

        match compute::delete_instance(ctx, &instance.name, Some(&zone)).await {
            OperationResult::Error { error, .. } => {
                warn!(
                    instance = %instance.name,
                    error = %error,
                    "Failed to delete expired instance"
                );
                sweep.failed.push(format!("{}: {}", instance.name, error));
            }
            _ => {
                info!(instance = %instance.name, "Deleted expired instance");
                sweep.deleted.push(instance.name.clone());
            }
        }
    }

    sweep.into_report("compute_instances", zone, dry_run)
}

pub async fn cleanup_expired_services(
    ctx: &CloudContext,
    region: Option<&str>,
    dry_run: bool,
) -> OperationResult<CleanupReport> {
    cleanup_services_at(ctx, region, dry_run, Utc::now()).await
}

async fn cleanup_services_at(
    ctx: &CloudContext,
    region: Option<&str>,
    dry_run: bool,
    now: DateTime<Utc>,
) -> OperationResult<CleanupReport> {
    let region = ctx.settings().region_or_default(region).to_string();
    info!(region = %region, dry_run, "Cleaning up expired services");

    let services = match ctx.run().list_services(&region).await {
        Ok(services) => services,
        Err(e) => {
            return failure::<CleanupReport>("clean up services in region", &region, &e)
                .with_context("resource_type", "cloud_run_services")
                .with_context("region", region.clone());
        }
    };

    let mut sweep = Sweep::default();
    for service in &services {
        let name = service.short_name();
        sweep.scanned += 1;
        let expiry = Expiry::evaluate(&service.labels, now);
        debug!(service = name, reason = %expiry.reason(now), "Checked expiry");
        if !expiry.is_expired() {
            continue;
        }

        sweep.expired += 1;
        if dry_run {
            info!(service = name, "[DRY RUN] Would delete service");
            sweep.deleted.push(format!("{} (dry-run)", name));
            continue;
        }

        match run::delete_service(ctx, name, Some(&region)).await {
            OperationResult::Error { error, .. } => {
                warn!(service = name, error = %error, "Failed to delete expired service");
                sweep.failed.push(format!("{}: {}", name, error));
            }
            _ => {
                info!(service = name, "Deleted expired service");
                sweep.deleted.push(name.to_string());
            }
        }
    }

    sweep.into_report("cloud_run_services", region, dry_run)
}

pub async fn cleanup_all_expired_resources(
    ctx: &CloudContext,
    zone: Option<&str>,
    region: Option<&str>,
    dry_run: bool,
) -> OperationResult<CombinedCleanupReport> {
    let now = Utc::now();
    info!(dry_run, "Cleaning up all expired resources");

    let (instances, services) = futures::join!(
        cleanup_instances_at(ctx, zone, dry_run, now),
        cleanup_services_at(ctx, region, dry_run, now)
    );

    if let (OperationResult::Error { error: a, .. }, OperationResult::Error { error: b, .. }) =
        (&instances, &services)
    {
        return OperationResult::error(
            "Failed to clean up expired resources",
            format!("compute instances: {}; cloud run services: {}", a, b),
        );
    }

    let parts = [instances.details(), services.details()];
    let sum = |f: fn(&CleanupSummary) -> usize| -> usize {
        parts.iter().flatten().map(|r| f(&r.summary)).sum()
    };
    let summary = CleanupSummary::new(
        sum(|s| s.total_scanned),
        sum(|s| s.total_expired),
        sum(|s| s.total_deleted),
        sum(|s| s.total_failed),
    );

    let message = format!(
        "Cleanup complete: {} deleted, {} failed out of {} expired resources",
        summary.total_deleted, summary.total_failed, summary.total_expired
    );
    OperationResult::success(
        message,
        CombinedCleanupReport {
            dry_run,
            summary,
            by_resource_type: ByResourceType {
                compute_instances: instances,
                cloud_run_services: services,
            },
        },
    )
}

pub async fn list_expiring_resources(
    ctx: &CloudContext,
    zone: Option<&str>,
    days_until_expiration: u32,
) -> OperationResult<ExpiringResources> {
    expiring_at(ctx, zone, days_until_expiration, Utc::now()).await
}

async fn expiring_at(
    ctx: &CloudContext,
    zone: Option<&str>,
    days: u32,
    now: DateTime<Utc>,
) -> OperationResult<ExpiringResources> {
    let zone = ctx.settings().zone_or_default(zone).to_string();
    info!(zone = %zone, days, "Listing expiring resources");

    let Some(threshold) = now.checked_add_signed(Duration::days(i64::from(days))) else {
        return invalid::<ExpiringResources>(
            "list expiring resources in zone",
            &zone,
            format!("days_until_expiration out of range: {}", days),
        )
        .with_context("zone", zone.clone());
    };

    let instances = match ctx.compute().list_instances(&zone).await {
        Ok(instances) => instances,
        Err(e) => {
            return failure::<ExpiringResources>("list expiring resources in zone", &zone, &e)
                .with_context("zone", zone.clone());
        }
    };

    let mut expiring_soon = Vec::new();
    let mut permanent_resources = Vec::new();

    for instance in &instances {
        let status = instance.status.clone().unwrap_or_else(|| "UNKNOWN".to_string());
        let label = |key: &str| instance.labels.get(key).cloned().unwrap_or_default();

        match Expiry::evaluate(&instance.labels, now) {
            Expiry::Permanent { .. } => permanent_resources.push(PermanentResource {
                name: instance.name.clone(),
                zone: zone.clone(),
                created_at: label(CREATED_AT_LABEL),
                status,
            }),
            Expiry::Active {
                created_at,
                expires_at,
            } if expires_at <= threshold => {
                let remaining = expires_at - now;
                expiring_soon.push(ExpiringResource {
                    name: instance.name.clone(),
                    zone: zone.clone(),
                    created_at: created_at.to_rfc3339(),
                    ttl: label(TTL_LABEL),
                    expires_at: expires_at.to_rfc3339(),
                    days_until_expiration: remaining.num_days(),
                    hours_until_expiration: remaining.num_hours(),
                    status,
                    owner: instance
                        .labels
                        .get(OWNER_LABEL)
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                });
            }
            Expiry::Invalid(reason) => {
                warn!(
                    instance = %instance.name,
                    reason = %reason,
                    "Skipping instance with malformed lifecycle labels"
                );
            }
            _ => {}
        }
    }

    // RFC 3339 strings in UTC sort chronologically
    expiring_soon.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));

    OperationResult::success(
        format!(
            "Found {} resources expiring within {} days",
            expiring_soon.len(),
            days
        ),
        ExpiringResources {
            zone,
            days_threshold: days,
            expiring_soon_count: expiring_soon.len(),
            permanent_count: permanent_resources.len(),
            expiring_soon,
            permanent_resources,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_report() {
        let sweep = Sweep {
            scanned: 5,
            expired: 2,
            deleted: vec!["vm1".to_string()],
            failed: vec!["vm2: boom".to_string()],
        };
        let result = sweep.into_report("compute_instances", "us-central1-a".to_string(), false);
        let report = result.details().unwrap();
        assert_eq!(report.summary.total_scanned, 5);
        assert_eq!(report.summary.total_deleted, 1);
        assert_eq!(report.summary.total_failed, 1);
        assert_eq!(report.summary.success_rate, "50.0%");
        assert_eq!(
            result.message(),
            "Cleanup complete: 1 deleted, 1 failed out of 2 expired resources"
        );
    }
}
