//! Firewall rules and instance network tags

use serde::{Deserialize, Serialize};
use tracing::info;

use super::compute::operation_result;
use super::{failure, invalid, require_name};
use crate::compute::{Allowed, Firewall, Tags};
use crate::context::CloudContext;
use crate::result::OperationResult;

pub const DEFAULT_PROTOCOL: &str = "tcp";
pub const DEFAULT_SOURCE_RANGE: &str = "0.0.0.0/0";

/// Inputs of `create_firewall_rule`
#[derive(Debug, Clone, PartialEq)]
pub struct FirewallRuleParams {
    pub rule_name: String,
    pub ports: Vec<String>,
    pub protocol: String,
    pub source_ranges: Vec<String>,
    pub target_tags: Vec<String>,
    pub description: Option<String>,
}

impl FirewallRuleParams {
    pub fn new(rule_name: impl Into<String>, ports: Vec<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            ports,
            protocol: DEFAULT_PROTOCOL.to_string(),
            source_ranges: vec![DEFAULT_SOURCE_RANGE.to_string()],
            target_tags: Vec::new(),
            description: None,
        }
    }

    fn validate(&self) -> Result<(), String> {
        require_name("Firewall rule", &self.rule_name)?;
        let protocol = self.protocol.trim().to_lowercase();
        if protocol.is_empty() {
            return Err("protocol must not be empty".to_string());
        }
        if matches!(protocol.as_str(), "tcp" | "udp") && self.ports.is_empty() {
            return Err(format!("at least one port is required for {}", protocol));
        }
        for port in &self.ports {
            if !valid_port_spec(port) {
                return Err(format!(
                    "invalid port '{}': expected a port (80) or range (8000-8080) between 1 and 65535",
                    port
                ));
            }
        }
        Ok(())
    }
}

fn valid_port_spec(spec: &str) -> bool {
    let parse = |p: &str| p.trim().parse::<u16>().ok().filter(|p| *p > 0);
    match spec.split_once('-') {
        Some((lo, hi)) => matches!((parse(lo), parse(hi)), (Some(lo), Some(hi)) if lo <= hi),
        None => parse(spec).is_some(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowedSummary {
    pub protocol: String,
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallSummary {
    pub name: String,
    pub direction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    pub allowed: Vec<AllowedSummary>,
    pub source_ranges: Vec<String>,
    pub target_tags: Vec<String>,
    pub description: String,
    pub disabled: bool,
}

impl FirewallSummary {
    fn from_firewall(rule: &Firewall) -> Self {
        Self {
            name: rule.name.clone(),
            direction: rule.direction.clone().unwrap_or_else(|| "INGRESS".to_string()),
            priority: rule.priority,
            allowed: rule
                .allowed
                .iter()
                .map(|a| AllowedSummary {
                    protocol: a.ip_protocol.clone(),
                    ports: a.ports.clone(),
                })
                .collect(),
            source_ranges: rule.source_ranges.clone(),
            target_tags: rule.target_tags.clone(),
            description: rule.description.clone().unwrap_or_default(),
            disabled: rule.disabled.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallRuleCreated {
    pub operation_id: String,
    pub rule_name: String,
    pub protocol: String,
    pub ports: Vec<String>,
    pub source_ranges: Vec<String>,
    pub target_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallRuleDeleted {
    pub operation_id: String,
    pub rule_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallRuleList {
    pub rules: Vec<FirewallSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagsUpdated {
    pub operation_id: String,
    pub instance_name: String,
    pub zone: String,
    /// Full tag set after the merge
    pub tags: Vec<String>,
}

/// Union of existing and new tags, trimmed, de-duplicated and sorted
pub fn merge_tags(existing: &[String], new: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = existing
        .iter()
        .chain(new)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

pub async fn create_firewall_rule(
    ctx: &CloudContext,
    params: &FirewallRuleParams,
) -> OperationResult<FirewallRuleCreated> {
    let name = params.rule_name.as_str();
    let resource = format!("firewall rule {}", name);
    if let Err(reason) = params.validate() {
        return invalid::<FirewallRuleCreated>("create", &resource, reason)
            .with_context("rule_name", name);
    }

    let protocol = params.protocol.trim().to_lowercase();
    let source_ranges = if params.source_ranges.is_empty() {
        vec![DEFAULT_SOURCE_RANGE.to_string()]
    } else {
        params.source_ranges.clone()
    };

    let rule = Firewall {
        name: name.to_string(),
        description: params.description.clone().filter(|d| !d.trim().is_empty()),
        network: Some(ctx.compute().default_network()),
        direction: Some("INGRESS".to_string()),
        allowed: vec![Allowed {
            ip_protocol: protocol.clone(),
            ports: params.ports.iter().map(|p| p.trim().to_string()).collect(),
        }],
        source_ranges: source_ranges.clone(),
        target_tags: params.target_tags.clone(),
        ..Default::default()
    };

    info!(rule = name, protocol = %protocol, ports = ?params.ports, "Creating firewall rule");
    let _guard = ctx.locks().acquire("firewall", "global", name).await;
    match ctx.compute().insert_firewall(&rule).await {
        Ok(operation) => operation_result(
            &operation,
            format!("Firewall rule {} created", name),
            format!("Firewall rule {} creation started", name),
            &resource,
            FirewallRuleCreated {
                operation_id: operation.name.clone(),
                rule_name: name.to_string(),
                protocol,
                ports: rule.allowed[0].ports.clone(),
                source_ranges,
                target_tags: params.target_tags.clone(),
            },
        ),
        Err(e) => failure::<FirewallRuleCreated>("create", &resource, &e)
            .with_context("rule_name", name),
    }
}

pub async fn delete_firewall_rule(
    ctx: &CloudContext,
    rule_name: &str,
) -> OperationResult<FirewallRuleDeleted> {
    let resource = format!("firewall rule {}", rule_name);
    if let Err(reason) = require_name("Firewall rule", rule_name) {
        return invalid("delete", &resource, reason);
    }

    info!(rule = rule_name, "Deleting firewall rule");
    let _guard = ctx.locks().acquire("firewall", "global", rule_name).await;
    match ctx.compute().delete_firewall(rule_name).await {
        Ok(operation) => operation_result(
            &operation,
            format!("Firewall rule {} deleted", rule_name),
            format!("Firewall rule {} deletion started", rule_name),
            &resource,
            FirewallRuleDeleted {
                operation_id: operation.name.clone(),
                rule_name: rule_name.to_string(),
            },
        ),
        Err(e) => failure::<FirewallRuleDeleted>("delete", &resource, &e)
            .with_context("rule_name", rule_name),
    }
}

pub async fn list_firewall_rules(ctx: &CloudContext) -> OperationResult<FirewallRuleList> {
    info!(project_id = ctx.project_id(), "Listing firewall rules");
    match ctx.compute().list_firewalls().await {
        Ok(rules) => {
            let rules: Vec<FirewallSummary> =
                rules.iter().map(FirewallSummary::from_firewall).collect();
            let count = rules.len();
            OperationResult::success(
                format!("Found {} firewall rules", count),
                FirewallRuleList { rules, count },
            )
        }
        Err(e) => failure("list firewall rules for project", ctx.project_id(), &e),
    }
}

pub async fn add_tags_to_instance(
    ctx: &CloudContext,
    instance_name: &str,
    tags: &[String],
    zone: Option<&str>,
) -> OperationResult<TagsUpdated> {
    let zone = ctx.settings().zone_or_default(zone).to_string();
    let resource = format!("instance {}", instance_name);
    if let Err(reason) = require_name("Instance", instance_name) {
        return invalid("add tags to", &resource, reason);
    }
    if tags.iter().all(|t| t.trim().is_empty()) {
        return invalid::<TagsUpdated>("add tags to", &resource, "at least one tag is required")
            .with_context("instance_name", instance_name);
    }

    info!(instance = instance_name, zone = %zone, tags = ?tags, "Adding network tags");
    let _guard = ctx.locks().acquire("instance", &zone, instance_name).await;

    // setTags needs the current fingerprint
    let instance = match ctx.compute().get_instance(&zone, instance_name).await {
        Ok(instance) => instance,
        Err(e) => {
            return failure::<TagsUpdated>("add tags to", &resource, &e)
                .with_context("instance_name", instance_name)
                .with_context("zone", zone);
        }
    };

    let merged = merge_tags(instance.network_tags(), tags);
    let request = Tags {
        fingerprint: instance.tags.as_ref().and_then(|t| t.fingerprint.clone()),
        items: merged.clone(),
    };

    match ctx.compute().set_tags(&zone, instance_name, &request).await {
        Ok(operation) => operation_result(
            &operation,
            format!("Tags updated for instance {}", instance_name),
            format!("Tag update started for instance {}", instance_name),
            &resource,
            TagsUpdated {
                operation_id: operation.name.clone(),
                instance_name: instance_name.to_string(),
                zone,
                tags: merged,
            },
        ),
        Err(e) => failure::<TagsUpdated>("add tags to", &resource, &e)
            .with_context("instance_name", instance_name)
            .with_context("zone", zone),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_tags() {
        assert_eq!(
            merge_tags(&strings(&["web", "ssh"]), &strings(&["minecraft", "web", " "])),
            strings(&["minecraft", "ssh", "web"])
        );
        assert_eq!(merge_tags(&[], &strings(&["a"])), strings(&["a"]));
    }

    #[test]
    fn test_port_specs() {
        assert!(valid_port_spec("80"));
        assert!(valid_port_spec("8000-8080"));
        assert!(!valid_port_spec("0"));
        assert!(!valid_port_spec("70000"));
        assert!(!valid_port_spec("90-80"));
        assert!(!valid_port_spec("http"));
    }

    #[test]
    fn test_rule_validation() {
        let params = FirewallRuleParams::new("allow-mc", strings(&["25565"]));
        assert!(params.validate().is_ok());
        assert_eq!(params.source_ranges, strings(&["0.0.0.0/0"]));

        let mut icmp = FirewallRuleParams::new("allow-ping", Vec::new());
        assert!(icmp.validate().is_err());
        icmp.protocol = "icmp".to_string();
        assert!(icmp.validate().is_ok());
    }
}
