//! # gcpctl-core
//!
//! Google Cloud orchestration engine shared by the gcpctl MCP server.
//!
//! The crate is layered:
//!
//! - **Credentials** ([`auth`]) - ambient identity discovery and cached access tokens
//! - **Configuration** ([`config`]) - environment-backed [`Settings`]
//! - **REST clients** ([`compute`], [`run`]) - thin async clients over the
//!   Compute Engine v1 and Cloud Run Admin v2 APIs
//! - **Operations** ([`ops`]) - VM, container service, aggregation, firewall
//!   and cleanup operations that always return an [`OperationResult`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use gcpctl_core::{CloudContext, Settings, ops};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_env()?;
//! let context = CloudContext::from_settings(settings)?;
//!
//! let result = ops::compute::list_instances(&context, None).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod compute;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod labels;
pub mod lifecycle;
pub mod locks;
pub mod ops;
pub mod result;
pub mod run;

pub use auth::{
    AccessToken, AmbientEnvironment, AuthError, CredentialKind, CredentialProvider,
    StaticTokenProvider, TokenProvider,
};
pub use config::{ConfigError, LogLevel, Settings};
pub use context::{CloudContext, CloudContextBuilder};
pub use error::{CoreError, Result};
pub use locks::ResourceLocks;
pub use result::OperationResult;

#[cfg(feature = "test-support")]
pub mod testing;
