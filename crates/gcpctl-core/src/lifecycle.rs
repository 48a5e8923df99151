//! TTL parsing and expiry evaluation for managed resources

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::labels::{
    CREATED_AT_FORMAT, CREATED_AT_LABEL, MANAGED_BY_LABEL, MANAGED_BY_VALUE, TTL_LABEL,
};

/// Longest accepted TTL, ten years
pub const MAX_TTL_DAYS: u32 = 3650;

/// Time-to-live of a managed resource: `never`, `<n>d` or `<n>h`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Never,
    Days(u32),
    Hours(u32),
}

impl Ttl {
    /// `None` for permanent resources
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Ttl::Never => None,
            Ttl::Days(d) => Some(Duration::days(i64::from(*d))),
            Ttl::Hours(h) => Some(Duration::hours(i64::from(*h))),
        }
    }
}

impl FromStr for Ttl {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        if value == "never" {
            return Ok(Ttl::Never);
        }

        let invalid = || {
            CoreError::Validation(format!(
                "Invalid TTL format: {}. Expected format: '7d', '24h', or 'never'",
                s
            ))
        };

        let mut chars = value.chars();
        let unit = chars.next_back().ok_or_else(invalid)?;
        let number = chars.as_str();
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let amount: u32 = number.parse().map_err(|_| invalid())?;

        let ttl = match unit {
            'd' => Ttl::Days(amount),
            'h' => Ttl::Hours(amount),
            _ => return Err(invalid()),
        };
        if ttl.duration() > Some(Duration::days(i64::from(MAX_TTL_DAYS))) {
            return Err(CoreError::Validation(format!(
                "TTL {} exceeds the maximum of {} days",
                s, MAX_TTL_DAYS
            )));
        }
        Ok(ttl)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Never => f.write_str("never"),
            Ttl::Days(d) => write!(f, "{}d", d),
            Ttl::Hours(h) => write!(f, "{}h", h),
        }
    }
}

/// Whether a TTL string is acceptable for the `ttl` label
pub fn validate_ttl(ttl: &str) -> bool {
    ttl.parse::<Ttl>().is_ok()
}

/// Parse a `created-at` label (`YYYYMMDD-HHMMSS`, UTC)
pub fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, CREATED_AT_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Lifecycle state derived from a resource's labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// Not created by this server
    Unmanaged,
    /// Managed but the lifecycle labels are missing or malformed
    Invalid(String),
    /// `ttl=never`
    Permanent { created_at: DateTime<Utc> },
    Active {
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    Expired {
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

impl Expiry {
    /// Evaluate labels at a point in time
    pub fn evaluate(labels: &BTreeMap<String, String>, now: DateTime<Utc>) -> Self {
        if labels.get(MANAGED_BY_LABEL).map(String::as_str) != Some(MANAGED_BY_VALUE) {
            return Expiry::Unmanaged;
        }

        let Some(created_raw) = labels.get(CREATED_AT_LABEL) else {
            return Expiry::Invalid(format!("Missing '{}' label", CREATED_AT_LABEL));
        };
        let Some(ttl_raw) = labels.get(TTL_LABEL) else {
            return Expiry::Invalid(format!("Missing '{}' label", TTL_LABEL));
        };
        let Ok(ttl) = ttl_raw.parse::<Ttl>() else {
            return Expiry::Invalid(format!("Invalid TTL format: {}", ttl_raw));
        };
        let Some(created_at) = parse_created_at(created_raw) else {
            return Expiry::Invalid(format!("Invalid created-at format: {}", created_raw));
        };

        match ttl.duration() {
            None => Expiry::Permanent { created_at },
            Some(ttl) => {
                let Some(expires_at) = created_at.checked_add_signed(ttl) else {
                    return Expiry::Invalid(format!("TTL out of range: {}", ttl_raw));
                };
                if now >= expires_at {
                    Expiry::Expired {
                        created_at,
                        expires_at,
                    }
                } else {
                    Expiry::Active {
                        created_at,
                        expires_at,
                    }
                }
            }
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Expiry::Expired { .. })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Expiry::Active { expires_at, .. } | Expiry::Expired { expires_at, .. } => {
                Some(*expires_at)
            }
            _ => None,
        }
    }

    /// Human-readable explanation of the state at `now`
    pub fn reason(&self, now: DateTime<Utc>) -> String {
        match self {
            Expiry::Unmanaged => "Not MCP-managed (missing 'managed-by: mcp' label)".to_string(),
            Expiry::Invalid(reason) => reason.clone(),
            Expiry::Permanent { .. } => "TTL is 'never' (permanent resource)".to_string(),
            Expiry::Active {
                created_at,
                expires_at,
            } => format!(
                "Resource not expired: created {}, age {}, {} remaining",
                created_at.to_rfc3339(),
                human_duration(now - *created_at),
                human_duration(*expires_at - now)
            ),
            Expiry::Expired {
                created_at,
                expires_at,
            } => format!(
                "Resource expired: created {}, age {}, expired {} ago",
                created_at.to_rfc3339(),
                human_duration(now - *created_at),
                human_duration(now - *expires_at)
            ),
        }
    }
}

/// Whether a resource has outlived its TTL, with the reason
pub fn is_resource_expired(
    labels: &BTreeMap<String, String>,
    now: DateTime<Utc>,
) -> (bool, String) {
    let expiry = Expiry::evaluate(labels, now);
    (expiry.is_expired(), expiry.reason(now))
}

fn human_duration(duration: Duration) -> String {
    let hours = duration.num_hours().max(0);
    format!("{} days {} hours", hours / 24, hours % 24)
}

/// Counts reported by every cleanup run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupSummary {
    pub total_scanned: usize,
    pub total_expired: usize,
    pub total_deleted: usize,
    pub total_failed: usize,
    /// `"NN.N%"`, or `"N/A"` when nothing expired
    pub success_rate: String,
}

impl CleanupSummary {
    pub fn new(scanned: usize, expired: usize, deleted: usize, failed: usize) -> Self {
        let success_rate = if expired > 0 {
            format!("{:.1}%", deleted as f64 / expired as f64 * 100.0)
        } else {
            "N/A".to_string()
        };
        Self {
            total_scanned: scanned,
            total_expired: expired,
            total_deleted: deleted,
            total_failed: failed,
            success_rate,
        }
    }
}
