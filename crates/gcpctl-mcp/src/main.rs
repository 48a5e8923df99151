//! gcpctl-mcp: MCP server for Google Cloud Compute Engine and Cloud Run
//!
//! Exposes instance, service, firewall and TTL lifecycle operations
//! as tools for AI systems.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gcpctl_core::Settings;
use gcpctl_mcp::{AppState, tools};
use tower_mcp::{CapabilityFilter, DenialBehavior, McpRouter, Tool, transport::StdioTransport};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Transport mode for the MCP server
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Transport {
    /// Streamable HTTP (Cloud Run, shared deployments)
    #[default]
    Http,
    /// Standard input/output (for CLI integrations)
    Stdio,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line, for Cloud Logging
    Json,
}

/// Toolsets that can be enabled or disabled at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
enum Toolset {
    /// Compute Engine instance tools
    Compute,
    /// Cloud Run service tools
    Run,
    /// Cross-service listing, summary and search
    Resources,
    /// Firewall rules and network tags
    Firewall,
    /// TTL-based cleanup
    Cleanup,
}

impl Toolset {
    const ALL: [Toolset; 5] = [
        Toolset::Compute,
        Toolset::Run,
        Toolset::Resources,
        Toolset::Firewall,
        Toolset::Cleanup,
    ];
}

impl std::fmt::Display for Toolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Toolset::Compute => write!(f, "compute"),
            Toolset::Run => write!(f, "run"),
            Toolset::Resources => write!(f, "resources"),
            Toolset::Firewall => write!(f, "firewall"),
            Toolset::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// MCP server for Google Cloud Compute Engine and Cloud Run
#[derive(Parser, Debug)]
#[command(name = "gcpctl-mcp")]
#[command(version, about, long_about = None)]
struct Args {
    /// Transport mode
    #[arg(short, long, value_enum, default_value = "http")]
    transport: Transport,

    /// Hide and reject every mutating tool
    #[arg(long)]
    read_only: bool,

    /// Toolsets to enable (default: all). Options: compute, run, resources, firewall, cleanup.
    #[arg(long, value_delimiter = ',', value_enum)]
    tools: Option<Vec<Toolset>>,

    // --- HTTP transport options ---
    /// Host to bind HTTP server
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind HTTP server
    #[arg(long, default_value = "8080", env = "PORT")]
    port: u16,

    // --- Rate limiting ---
    /// Maximum concurrent requests
    #[arg(long, default_value = "10")]
    max_concurrent: usize,

    /// Request timeout in seconds (HTTP mode)
    #[arg(long, default_value = "120")]
    request_timeout_secs: u64,

    // --- Logging ---
    /// Log format
    #[arg(long, value_enum, default_value = "text", env = "LOG_FORMAT")]
    log_format: LogFormat,
}

/// Resolve which toolsets are enabled. An explicit `--tools` list wins over the default of all.
fn enabled_toolsets(args: &Args) -> HashSet<Toolset> {
    match args.tools {
        Some(ref tools) => tools.iter().copied().collect(),
        None => Toolset::ALL.into_iter().collect(),
    }
}

fn init_tracing(settings: &Settings, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_directive()));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration errors stop startup before any tool is registered
    let settings = Settings::from_env().context("Invalid server configuration")?;

    init_tracing(&settings, args.log_format);

    let enabled = enabled_toolsets(&args);
    let enabled_names: Vec<String> = enabled.iter().map(|t| t.to_string()).collect();

    info!(
        transport = ?args.transport,
        project_id = %settings.project_id,
        region = %settings.region,
        zone = %settings.zone,
        read_only = args.read_only,
        toolsets = ?enabled_names,
        "Starting gcpctl-mcp server"
    );

    let state = Arc::new(AppState::new(settings, args.read_only)?);

    let router = build_router(state, args.read_only, &enabled)?;

    match args.transport {
        Transport::Stdio => {
            info!("Running with stdio transport");
            StdioTransport::new(router).run().await?;
        }
        Transport::Http => {
            info!(host = %args.host, port = args.port, "Running with HTTP transport");
            run_http_server(router, &args).await?;
        }
    }

    Ok(())
}

/// Footer instructions for authentication and lifecycle labels
const FOOTER_INSTRUCTIONS: &str = r#"
## Authentication

Credentials come from GOOGLE_APPLICATION_CREDENTIALS, GOOGLE_OAUTH_ACCESS_TOKEN
or the metadata server of the runtime environment.

## Managed Resources

Created instances and services are labeled managed-by=mcp with a created-at
timestamp and a ttl ("7d", "24h" or "never"). Cleanup tools only ever delete
managed resources whose ttl has passed.
"#;

/// Build the MCP router with modular sub-routers based on enabled toolsets
fn build_router(
    state: Arc<AppState>,
    read_only: bool,
    enabled: &HashSet<Toolset>,
) -> Result<McpRouter> {
    let mut instructions = String::from(
        r#"Google Cloud MCP Server

This server manages Compute Engine VM instances and Cloud Run services in a single
project: listing, creating, starting, stopping and deleting them, opening firewall
ports, and cleaning up resources whose time to live has expired.

## Available Tool Categories
"#,
    );

    // Liveness probe, independent of the selected toolsets
    let mut router = McpRouter::new()
        .server_info("gcpctl-mcp", env!("CARGO_PKG_VERSION"))
        .tool(tools::resources::health_check(state.clone()));

    if enabled.contains(&Toolset::Compute) {
        router = router.merge(tools::compute::router(state.clone()));
        instructions.push_str(tools::compute::INSTRUCTIONS);
    }

    if enabled.contains(&Toolset::Run) {
        router = router.merge(tools::run::router(state.clone()));
        instructions.push_str(tools::run::INSTRUCTIONS);
    }

    if enabled.contains(&Toolset::Resources) {
        router = router.merge(tools::resources::router(state.clone()));
        instructions.push_str(tools::resources::INSTRUCTIONS);
    }

    if enabled.contains(&Toolset::Firewall) {
        router = router.merge(tools::firewall::router(state.clone()));
        instructions.push_str(tools::firewall::INSTRUCTIONS);
    }

    if enabled.contains(&Toolset::Cleanup) {
        router = router.merge(tools::cleanup::router(state.clone()));
        instructions.push_str(tools::cleanup::INSTRUCTIONS);
    }

    instructions.push_str(FOOTER_INSTRUCTIONS);
    router = router.instructions(&instructions);

    // Write tools are hidden from tools/list and rejected if called directly;
    // handlers check the flag again.
    let router = if read_only {
        info!("Applying read-only filter - write tools will be hidden");
        router.tool_filter(
            CapabilityFilter::new(|_session, tool: &Tool| {
                tool.annotations
                    .as_ref()
                    .map(|a| a.read_only_hint)
                    .unwrap_or(false)
            })
            .denial_behavior(DenialBehavior::Unauthorized),
        )
    } else {
        router
    };

    Ok(router)
}

/// Run the HTTP server with middleware
#[cfg(feature = "http")]
async fn run_http_server(router: McpRouter, args: &Args) -> Result<()> {
    use std::time::Duration;
    use tower::limit::ConcurrencyLimitLayer;
    use tower::timeout::TimeoutLayer;
    use tower_mcp::HttpTransport;

    let addr = format!("{}:{}", args.host, args.port);

    let transport = HttpTransport::new(router)
        .layer(TimeoutLayer::new(Duration::from_secs(
            args.request_timeout_secs,
        )))
        .layer(ConcurrencyLimitLayer::new(args.max_concurrent));

    transport.serve(&addr).await?;

    Ok(())
}

#[cfg(not(feature = "http"))]
async fn run_http_server(_router: McpRouter, _args: &Args) -> Result<()> {
    anyhow::bail!("HTTP transport requires the 'http' feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["gcpctl-mcp"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn all_toolsets_by_default() {
        let args = parse(&[]);
        let toolsets = enabled_toolsets(&args);
        assert_eq!(toolsets.len(), 5);
        for toolset in Toolset::ALL {
            assert!(toolsets.contains(&toolset), "missing {toolset}");
        }
    }

    #[test]
    fn explicit_tools_flag_selects_subset() {
        let args = parse(&["--tools", "compute,cleanup"]);
        let toolsets = enabled_toolsets(&args);
        assert_eq!(toolsets.len(), 2);
        assert!(toolsets.contains(&Toolset::Compute));
        assert!(toolsets.contains(&Toolset::Cleanup));
        assert!(!toolsets.contains(&Toolset::Run));
    }

    #[test]
    fn unknown_toolset_is_rejected() {
        let result = Args::try_parse_from(["gcpctl-mcp", "--tools", "storage"]);
        assert!(result.is_err());
    }

    #[test]
    fn defaults_match_cloud_run_deployment() {
        let args = parse(&[]);
        assert!(matches!(args.transport, Transport::Http));
        assert_eq!(args.host, "0.0.0.0");
        assert!(!args.read_only);
        assert_eq!(args.max_concurrent, 10);
        assert_eq!(args.request_timeout_secs, 120);
    }

    #[test]
    fn stdio_and_read_only_flags() {
        let args = parse(&["--transport", "stdio", "--read-only"]);
        assert!(matches!(args.transport, Transport::Stdio));
        assert!(args.read_only);
    }

    #[test]
    fn toolset_names_match_cli_values() {
        for toolset in Toolset::ALL {
            let parsed = Toolset::from_str(&toolset.to_string(), true).unwrap();
            assert_eq!(parsed, toolset);
        }
    }
}
