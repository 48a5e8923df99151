//! Typed configuration for the orchestration server
//!
//! Settings are resolved once at process start from environment variables.
//! A missing `GCP_PROJECT_ID` is fatal; every other option has a default.
//!
//! # Example
//!
//! ```rust
//! use gcpctl_core::config::Settings;
//!
//! let settings = Settings::from_lookup(|key| match key {
//!     "GCP_PROJECT_ID" => Some("my-project".to_string()),
//!     _ => None,
//! })
//! .unwrap();
//!
//! assert_eq!(settings.zone_or_default(None), "us-central1-a");
//! assert_eq!(settings.zone_or_default(Some("us-west1-a")), "us-west1-a");
//! ```

pub mod error;
pub mod settings;

pub use error::{ConfigError, Result};
pub use settings::{LogLevel, Settings};
