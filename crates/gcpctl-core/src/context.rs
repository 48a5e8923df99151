//! Explicit dependencies shared by every service operation

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AmbientEnvironment, CredentialProvider, TokenProvider};
use crate::compute::{COMPUTE_ENDPOINT, ComputeClient};
use crate::config::Settings;
use crate::error::{CoreError, Result};
use crate::http::{ApiClient, DEFAULT_TIMEOUT};
use crate::locks::ResourceLocks;
use crate::run::{RUN_ENDPOINT, RunClient};

/// Settings, REST clients, credentials and resource locks for one project.
///
/// Built once at startup and shared behind an `Arc`.
///
/// ```rust
/// use std::sync::Arc;
/// use gcpctl_core::{CloudContext, Settings, StaticTokenProvider};
///
/// let context = CloudContext::builder(Settings::new("demo-project"))
///     .token_provider(Arc::new(StaticTokenProvider::new("test-token")))
///     .compute_endpoint("http://127.0.0.1:9000/compute/v1")
///     .build()
///     .unwrap();
/// assert_eq!(context.settings().project_id, "demo-project");
/// ```
#[derive(Debug, Clone)]
pub struct CloudContext {
    settings: Settings,
    compute: ComputeClient,
    run: RunClient,
    locks: ResourceLocks,
}

impl CloudContext {
    pub fn builder(settings: Settings) -> CloudContextBuilder {
        CloudContextBuilder::new(settings)
    }

    /// Context using ambient credentials and the public endpoints
    pub fn from_settings(settings: Settings) -> Result<Self> {
        Self::builder(settings).build()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn compute(&self) -> &ComputeClient {
        &self.compute
    }

    pub fn run(&self) -> &RunClient {
        &self.run
    }

    pub fn locks(&self) -> &ResourceLocks {
        &self.locks
    }

    pub fn project_id(&self) -> &str {
        &self.settings.project_id
    }
}

/// Builder for [`CloudContext`]
pub struct CloudContextBuilder {
    settings: Settings,
    tokens: Option<Arc<dyn TokenProvider>>,
    compute_endpoint: String,
    run_endpoint: String,
    timeout: Duration,
}

impl CloudContextBuilder {
    fn new(settings: Settings) -> Self {
        Self {
            settings,
            tokens: None,
            compute_endpoint: COMPUTE_ENDPOINT.to_string(),
            run_endpoint: RUN_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use this provider instead of ambient credential discovery
    #[must_use]
    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn compute_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.compute_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn run_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.run_endpoint = endpoint.into();
        self
    }

    /// Per-request timeout for outbound calls
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<CloudContext> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("gcpctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(CoreError::Http)?;

        let tokens: Arc<dyn TokenProvider> = match self.tokens {
            Some(tokens) => tokens,
            None => Arc::new(CredentialProvider::new(
                AmbientEnvironment::from_settings(&self.settings),
                http.clone(),
            )),
        };

        let project = self.settings.project_id.clone();
        let compute = ComputeClient::new(
            ApiClient::new(http.clone(), self.compute_endpoint, tokens.clone()),
            project.clone(),
        );
        let run = RunClient::new(ApiClient::new(http, self.run_endpoint, tokens), project);

        Ok(CloudContext {
            settings: self.settings,
            compute,
            run,
            locks: ResourceLocks::new(),
        })
    }
}
