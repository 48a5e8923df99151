//! Cloud Run Admin v2 REST payloads

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const TRAFFIC_LATEST: &str = "TRAFFIC_TARGET_ALLOCATION_TYPE_LATEST";
pub const TRAFFIC_REVISION: &str = "TRAFFIC_TARGET_ALLOCATION_TYPE_REVISION";

/// Last segment of a fully qualified resource name
/// (`projects/p/locations/r/services/web` -> `web`)
pub fn short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Fully qualified name; left empty on create-or-update bodies
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<RevisionTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic: Vec<TrafficTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_ready_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_created_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic_statuses: Vec<TrafficTargetStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciling: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl Service {
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }

    /// Ready unless the terminal condition says otherwise
    pub fn status(&self) -> &'static str {
        match self.terminal_condition.as_ref().and_then(|c| c.state.as_deref()) {
            Some("CONDITION_SUCCEEDED") => "Ready",
            Some("CONDITION_FAILED") => "Failed",
            Some("CONDITION_RECONCILING") | Some("CONDITION_PENDING") => "Deploying",
            _ if self.reconciling == Some(true) => "Deploying",
            _ => "Unknown",
        }
    }

    /// Container image of the current template
    pub fn image(&self) -> Option<&str> {
        self.template
            .as_ref()
            .and_then(|t| t.containers.first())
            .map(|c| c.image.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<RevisionScaling>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionScaling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_instance_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instance_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficTarget {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default)]
    pub percent: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl TrafficTarget {
    pub fn latest(percent: u32) -> Self {
        Self {
            kind: Some(TRAFFIC_LATEST.to_string()),
            revision: None,
            percent,
            tag: None,
        }
    }

    pub fn revision(revision: impl Into<String>, percent: u32) -> Self {
        Self {
            kind: Some(TRAFFIC_REVISION.to_string()),
            revision: Some(revision.into()),
            percent,
            tag: None,
        }
    }

    pub fn is_latest(&self) -> bool {
        self.kind.as_deref() == Some(TRAFFIC_LATEST)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficTargetStatus {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub percent: u32,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListServicesResponse {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// google.longrunning.Operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<Status>,
}

impl Operation {
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|status| {
            if status.message.is_empty() {
                format!("operation failed with code {}", status.code)
            } else {
                status.message.clone()
            }
        })
    }
}

/// google.rpc.Status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_decode() {
        let service: Service = serde_json::from_value(json!({
            "name": "projects/demo/locations/us-central1/services/web",
            "uri": "https://web-abc-uc.a.run.app",
            "labels": {"managed-by": "mcp"},
            "template": {"containers": [{"image": "gcr.io/demo/web:1"}]},
            "traffic": [{"type": "TRAFFIC_TARGET_ALLOCATION_TYPE_LATEST", "percent": 100}],
            "terminalCondition": {"type": "Ready", "state": "CONDITION_SUCCEEDED"},
            "latestReadyRevision": "projects/demo/locations/us-central1/revisions/web-00001-abc"
        }))
        .unwrap();

        assert_eq!(service.short_name(), "web");
        assert_eq!(service.status(), "Ready");
        assert_eq!(service.image(), Some("gcr.io/demo/web:1"));
        assert!(service.traffic[0].is_latest());
    }

    #[test]
    fn test_traffic_target_encoding() {
        assert_eq!(
            serde_json::to_value(TrafficTarget::revision("web-00002-xyz", 20)).unwrap(),
            json!({
                "type": "TRAFFIC_TARGET_ALLOCATION_TYPE_REVISION",
                "revision": "web-00002-xyz",
                "percent": 20
            })
        );
        assert_eq!(
            serde_json::to_value(TrafficTarget::latest(80)).unwrap(),
            json!({"type": "TRAFFIC_TARGET_ALLOCATION_TYPE_LATEST", "percent": 80})
        );
    }

    #[test]
    fn test_status_mapping() {
        let mut service = Service::default();
        assert_eq!(service.status(), "Unknown");
        service.reconciling = Some(true);
        assert_eq!(service.status(), "Deploying");
        service.terminal_condition = Some(Condition {
            state: Some("CONDITION_FAILED".to_string()),
            ..Default::default()
        });
        assert_eq!(service.status(), "Failed");
    }

    #[test]
    fn test_operation_error() {
        let op: Operation = serde_json::from_value(json!({
            "name": "projects/demo/locations/us-central1/operations/op-1",
            "done": true,
            "error": {"code": 3, "message": "Image not found"}
        }))
        .unwrap();
        assert_eq!(op.error_message().as_deref(), Some("Image not found"));
    }
}
