//! Application state shared by every tool

use std::sync::Arc;

use gcpctl_core::{CloudContext, Settings};

use crate::error::ServerError;

/// Shared application state
pub struct AppState {
    /// Read-only mode flag
    pub read_only: bool,
    context: Arc<CloudContext>,
}

impl AppState {
    /// Build the cloud context from settings.
    ///
    /// Credentials are discovered on the first outbound call, not here.
    pub fn new(settings: Settings, read_only: bool) -> Result<Self, ServerError> {
        let context = CloudContext::from_settings(settings)?;
        Ok(Self {
            read_only,
            context: Arc::new(context),
        })
    }

    /// State around an already built context
    pub fn with_context(context: CloudContext, read_only: bool) -> Self {
        Self {
            read_only,
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &CloudContext {
        &self.context
    }

    pub fn settings(&self) -> &Settings {
        self.context.settings()
    }

    /// Check if write operations are allowed
    pub fn is_write_allowed(&self) -> bool {
        !self.read_only
    }
}
