//! Environment-backed settings

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::{ConfigError, Result};

pub const PROJECT_ID_VAR: &str = "GCP_PROJECT_ID";
pub const REGION_VAR: &str = "GCP_REGION";
pub const ZONE_VAR: &str = "DEFAULT_ZONE";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const CREDENTIALS_FILE_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const RESOURCE_OWNER_VAR: &str = "RESOURCE_OWNER";

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_ZONE: &str = "us-central1-a";

/// Log verbosity accepted in `LOG_LEVEL`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// The equivalent `tracing` filter directive
    #[must_use]
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(ConfigError::InvalidValue {
                name: LOG_LEVEL_VAR,
                value: s.to_string(),
                reason: "expected one of DEBUG, INFO, WARNING, ERROR, CRITICAL".to_string(),
            }),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Operating parameters for every service operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Google Cloud project that owns every managed resource
    pub project_id: String,
    /// Default region for Cloud Run services
    pub region: String,
    /// Default zone for Compute Engine instances
    pub zone: String,
    /// Log verbosity
    pub log_level: LogLevel,
    /// Explicit credential key file, if any
    pub credentials_file: Option<PathBuf>,
    /// Owner recorded in the `owner` label of created resources
    pub resource_owner: Option<String>,
}

impl Settings {
    /// Create settings for a project with every other option at its default
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: DEFAULT_REGION.to_string(),
            zone: DEFAULT_ZONE.to_string(),
            log_level: LogLevel::default(),
            credentials_file: None,
            resource_owner: None,
        }
    }

    /// Load settings from the process environment.
    ///
    /// Variable names are matched case-insensitively.
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars()
            .map(|(k, v)| (k.to_ascii_uppercase(), v))
            .collect();
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Load settings through an arbitrary lookup function keyed by
    /// upper-case variable name. Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let project_id = get(PROJECT_ID_VAR).ok_or(ConfigError::MissingVariable {
            name: PROJECT_ID_VAR,
        })?;

        let log_level = match get(LOG_LEVEL_VAR) {
            Some(level) => level.parse()?,
            None => LogLevel::default(),
        };

        Ok(Self {
            project_id,
            region: get(REGION_VAR).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            zone: get(ZONE_VAR).unwrap_or_else(|| DEFAULT_ZONE.to_string()),
            log_level,
            credentials_file: get(CREDENTIALS_FILE_VAR).map(PathBuf::from),
            resource_owner: get(RESOURCE_OWNER_VAR),
        })
    }

    /// Resolve an optional zone against the configured default
    #[must_use]
    pub fn zone_or_default<'a>(&'a self, zone: Option<&'a str>) -> &'a str {
        match zone {
            Some(z) if !z.trim().is_empty() => z,
            _ => &self.zone,
        }
    }

    /// Resolve an optional region against the configured default
    #[must_use]
    pub fn region_or_default<'a>(&'a self, region: Option<&'a str>) -> &'a str {
        match region {
            Some(r) if !r.trim().is_empty() => r,
            _ => &self.region,
        }
    }
}
