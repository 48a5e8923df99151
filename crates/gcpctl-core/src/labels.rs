//! Ownership and lifecycle labels applied to every created resource
//!
//! Label keys and values must be lowercase, use only `[a-z0-9_-]` and stay
//! within 63 characters, so user input is sanitized before merging.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

pub const MANAGED_BY_LABEL: &str = "managed-by";
pub const MANAGED_BY_VALUE: &str = "mcp";
pub const CREATED_AT_LABEL: &str = "created-at";
pub const TTL_LABEL: &str = "ttl";
pub const OWNER_LABEL: &str = "owner";

pub const DEFAULT_TTL: &str = "7d";

/// `created-at` timestamp format (UTC)
pub const CREATED_AT_FORMAT: &str = "%Y%m%d-%H%M%S";

const MAX_LABEL_LEN: usize = 63;

/// Labels the caller may not override
const IMMUTABLE_LABELS: [&str; 2] = [MANAGED_BY_LABEL, CREATED_AT_LABEL];

/// Lowercase, map `_ . @` to `-` and truncate to 63 characters
pub fn sanitize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '_' | '.' | '@' => '-',
            other => other,
        })
        .take(MAX_LABEL_LEN)
        .collect()
}

/// System labels stamped on a resource created at `now`
pub fn default_labels(owner: Option<&str>, now: DateTime<Utc>) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
    labels.insert(
        CREATED_AT_LABEL.to_string(),
        now.format(CREATED_AT_FORMAT).to_string(),
    );
    labels.insert(TTL_LABEL.to_string(), DEFAULT_TTL.to_string());
    if let Some(owner) = owner.filter(|o| !o.trim().is_empty()) {
        labels.insert(OWNER_LABEL.to_string(), sanitize(owner));
    }
    labels
}

/// Merge sanitized user labels over the defaults.
///
/// `ttl` replaces the default TTL; user labels may override `owner` and
/// `ttl` but never `managed-by` or `created-at`.
pub fn merge_labels<'a, I>(
    user_labels: I,
    ttl: &str,
    owner: Option<&str>,
    now: DateTime<Utc>,
) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut merged = default_labels(owner, now);
    if !ttl.is_empty() {
        merged.insert(TTL_LABEL.to_string(), ttl.to_string());
    }

    for (key, value) in user_labels {
        let key = sanitize(key);
        if IMMUTABLE_LABELS.contains(&key.as_str()) {
            debug!(label = %key, "Ignoring attempt to override system label");
            continue;
        }
        merged.insert(key, sanitize(value));
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 17, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Team_Name"), "team-name");
        assert_eq!(sanitize("alice@example.com"), "alice-example-com");
        assert_eq!(sanitize(&"x".repeat(100)).len(), 63);
    }

    #[test]
    fn test_default_labels() {
        let labels = default_labels(Some("Platform.Team"), now());
        assert_eq!(labels["managed-by"], "mcp");
        assert_eq!(labels["created-at"], "20250117-143000");
        assert_eq!(labels["ttl"], "7d");
        assert_eq!(labels["owner"], "platform-team");
        assert!(!default_labels(None, now()).contains_key("owner"));
    }

    #[test]
    fn test_merge_labels() {
        let user: HashMap<String, String> = [
            ("Env".to_string(), "Prod".to_string()),
            ("managed-by".to_string(), "someone-else".to_string()),
            ("created_at".to_string(), "19700101-000000".to_string()),
            ("owner".to_string(), "bob".to_string()),
        ]
        .into_iter()
        .collect();

        let merged = merge_labels(&user, "30d", Some("alice"), now());

        let expected: BTreeMap<String, String> = [
            ("created-at", "20250117-143000"),
            ("env", "prod"),
            ("managed-by", "mcp"),
            ("owner", "bob"),
            ("ttl", "30d"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_merge_without_user_labels() {
        let merged = merge_labels(&BTreeMap::<String, String>::new(), "", None, now());
        assert_eq!(merged["ttl"], "7d");
        assert_eq!(merged.len(), 3);
    }
}
