//! MCP (Model Context Protocol) server for Google Cloud
//!
//! This crate exposes Compute Engine and Cloud Run operations from
//! [`gcpctl_core`] as MCP tools.
//!
//! ## Binary Usage
//!
//! ```bash
//! # Streamable HTTP on 0.0.0.0:8080 (Cloud Run, shared deployments)
//! GCP_PROJECT_ID=my-project gcpctl-mcp
//!
//! # Stdio transport for local clients, without mutating tools
//! GCP_PROJECT_ID=my-project gcpctl-mcp --transport stdio --read-only
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use gcpctl_core::Settings;
//! use gcpctl_mcp::{AppState, tools};
//! use tower_mcp::McpRouter;
//!
//! # fn example() -> anyhow::Result<()> {
//! let state = Arc::new(AppState::new(Settings::from_env()?, true)?);
//!
//! let router = McpRouter::new()
//!     .tool(tools::compute::list_instances(state.clone()))
//!     .tool(tools::run::list_services(state.clone()));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod state;
pub mod tools;

pub use error::ServerError;
pub use state::AppState;
