//! Error types for the MCP server

use gcpctl_core::{ConfigError, CoreError};
use thiserror::Error;

/// Errors that can occur while starting or serving
#[derive(Error, Debug)]
pub enum ServerError {
    /// Missing or invalid environment settings
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The cloud context could not be built
    #[error("Failed to initialize cloud clients: {0}")]
    Context(#[from] CoreError),

    /// Operation not permitted in read-only mode
    #[error("Write operations not allowed in read-only mode")]
    ReadOnlyMode,
}
