//! Firewall rule and network tag tools

use std::sync::Arc;

use gcpctl_core::ops::firewall::{self, DEFAULT_PROTOCOL, DEFAULT_SOURCE_RANGE, FirewallRuleParams};
use schemars::JsonSchema;
use serde::Deserialize;
use tower_mcp::extract::{Json, State};
use tower_mcp::{McpRouter, Tool, ToolBuilder};

use super::{reply, require_write};
use crate::state::AppState;

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

fn default_source_ranges() -> Vec<String> {
    vec![DEFAULT_SOURCE_RANGE.to_string()]
}

/// Input for creating a firewall rule
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateFirewallRuleInput {
    /// Name of the rule
    pub rule_name: String,
    /// Ports or ranges to open, e.g. ["25565"] or ["8000-8080"]
    #[serde(default)]
    pub ports: Vec<String>,
    /// IP protocol (default: tcp)
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Source CIDR ranges (default: ["0.0.0.0/0"])
    #[serde(default = "default_source_ranges")]
    pub source_ranges: Vec<String>,
    /// Network tags of the instances the rule applies to. Empty applies to all instances.
    #[serde(default)]
    pub target_tags: Vec<String>,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

impl From<CreateFirewallRuleInput> for FirewallRuleParams {
    fn from(input: CreateFirewallRuleInput) -> Self {
        Self {
            rule_name: input.rule_name,
            ports: input.ports,
            protocol: input.protocol,
            source_ranges: input.source_ranges,
            target_tags: input.target_tags,
            description: input.description,
        }
    }
}

/// Build the create_firewall_rule tool
pub fn create_firewall_rule(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("create_firewall_rule")
        .description(
            "Create an ingress firewall rule on the default network, e.g. to open a game server \
             port for instances carrying a network tag. Requires write permission.",
        )
        .non_destructive()
        .extractor_handler_typed::<_, _, _, CreateFirewallRuleInput>(
            state,
            |State(state): State<Arc<AppState>>,
             Json(input): Json<CreateFirewallRuleInput>| async move {
                require_write(&state)?;
                let params = FirewallRuleParams::from(input);
                let result = firewall::create_firewall_rule(state.context(), &params).await;
                reply(&result)
            },
        )
        .build()
}

/// Input for deleting a firewall rule
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteFirewallRuleInput {
    /// Name of the rule to delete
    pub rule_name: String,
}

/// Build the delete_firewall_rule tool
pub fn delete_firewall_rule(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("delete_firewall_rule")
        .description(
            "Delete a firewall rule. This is a destructive operation. Requires write permission.",
        )
        .destructive()
        .extractor_handler_typed::<_, _, _, DeleteFirewallRuleInput>(
            state,
            |State(state): State<Arc<AppState>>,
             Json(input): Json<DeleteFirewallRuleInput>| async move {
                require_write(&state)?;
                let result =
                    firewall::delete_firewall_rule(state.context(), &input.rule_name).await;
                reply(&result)
            },
        )
        .build()
}

/// Input for listing firewall rules
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListFirewallRulesInput {}

/// Build the list_firewall_rules tool
pub fn list_firewall_rules(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("list_firewall_rules")
        .description(
            "List firewall rules in the project with direction, priority, allowed protocols \
             and ports, source ranges and target tags.",
        )
        .read_only()
        .idempotent()
        .extractor_handler_typed::<_, _, _, ListFirewallRulesInput>(
            state,
            |State(state): State<Arc<AppState>>,
             Json(_input): Json<ListFirewallRulesInput>| async move {
                let result = firewall::list_firewall_rules(state.context()).await;
                reply(&result)
            },
        )
        .build()
}

/// Input for tagging an instance
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddTagsInput {
    /// Name of the instance
    pub instance_name: String,
    /// Network tags to add; existing tags are kept
    pub tags: Vec<String>,
    /// Zone where the instance is located. Defaults to the configured zone.
    #[serde(default)]
    pub zone: Option<String>,
}

/// Build the add_tags_to_instance tool
pub fn add_tags_to_instance(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("add_tags_to_instance")
        .description(
            "Add network tags to a Compute Engine instance so that tag-targeted firewall rules \
             apply to it. Existing tags are preserved. Requires write permission.",
        )
        .non_destructive()
        .idempotent()
        .extractor_handler_typed::<_, _, _, AddTagsInput>(
            state,
            |State(state): State<Arc<AppState>>, Json(input): Json<AddTagsInput>| async move {
                require_write(&state)?;
                let result = firewall::add_tags_to_instance(
                    state.context(),
                    &input.instance_name,
                    &input.tags,
                    input.zone.as_deref(),
                )
                .await;
                reply(&result)
            },
        )
        .build()
}

pub const INSTRUCTIONS: &str = r#"
### Firewall
- list_firewall_rules: List firewall rules

### Firewall - Write Operations (hidden with --read-only)
- create_firewall_rule: Open ports for tagged instances
- add_tags_to_instance: Add network tags to an instance
- delete_firewall_rule: Delete a rule
"#;

/// Build an MCP sub-router containing the firewall tools
pub fn router(state: Arc<AppState>) -> McpRouter {
    McpRouter::new()
        .tool(list_firewall_rules(state.clone()))
        // Write Operations
        .tool(create_firewall_rule(state.clone()))
        .tool(add_tags_to_instance(state.clone()))
        .tool(delete_firewall_rule(state))
}
