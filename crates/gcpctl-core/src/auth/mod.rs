//! Ambient credential discovery and access-token caching
//!
//! The [`CredentialProvider`] resolves an identity the same way Google's
//! Application Default Credentials do:
//!
//! 1. `GOOGLE_OAUTH_ACCESS_TOKEN` (a pre-minted bearer token)
//! 2. `GOOGLE_APPLICATION_CREDENTIALS` (service account or authorized user key file)
//! 3. gcloud's well-known `application_default_credentials.json`
//! 4. The GCE / Cloud Run metadata server
//!
//! Discovery happens once, on the first call to
//! [`CredentialProvider::get_credentials`]. The resulting token is cached
//! and only refreshed when it is about to expire.

mod source;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use crate::config::Settings;

pub use source::CredentialKind;
use source::CredentialSource;

/// OAuth scope requested for every token
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Default OAuth token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Default metadata server host
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const ACCESS_TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
const METADATA_HOST_VAR: &str = "GCE_METADATA_HOST";

/// Tokens closer than this to expiry are refreshed
const REFRESH_MARGIN_SECS: i64 = 60;

/// Errors raised while obtaining credentials
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication error: no ambient identity found: {0}")]
    NoAmbientIdentity(String),

    #[error("Authentication error: failed to load credentials file {path}: {message}")]
    CredentialsFile { path: String, message: String },

    #[error("Authentication error: token exchange failed: {0}")]
    TokenExchange(String),
}

/// Bearer token used on outbound API calls
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// `None` for tokens of unknown lifetime (pre-minted tokens)
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// A token that never expires from the cache's point of view
    pub fn non_expiring(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// A token valid for `expires_in` seconds from now
    pub fn expiring_in(token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(Utc::now() + Duration::seconds(expires_in)),
        }
    }

    /// Whether the token can still be used at `now`
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now,
            None => true,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Anything that can hand out bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, AuthError>;
}

/// A provider that always returns the same token
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::non_expiring(token),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        Ok(self.token.clone())
    }
}

/// Snapshot of the environment inputs used for discovery
#[derive(Debug, Clone, Default)]
pub struct AmbientEnvironment {
    /// Pre-minted bearer token
    pub access_token: Option<String>,
    /// Explicit key file (`GOOGLE_APPLICATION_CREDENTIALS`)
    pub credentials_file: Option<PathBuf>,
    /// gcloud's well-known ADC file location
    pub well_known_file: Option<PathBuf>,
    /// Metadata server host (optionally with port)
    pub metadata_host: String,
}

impl AmbientEnvironment {
    /// Capture discovery inputs from settings and the process environment
    pub fn from_settings(settings: &Settings) -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            access_token: non_empty(ACCESS_TOKEN_VAR),
            credentials_file: settings.credentials_file.clone(),
            well_known_file: directories::BaseDirs::new().map(|dirs| {
                dirs.config_dir()
                    .join("gcloud")
                    .join("application_default_credentials.json")
            }),
            metadata_host: non_empty(METADATA_HOST_VAR)
                .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string()),
        }
    }
}

/// Discovers the ambient identity once and caches access tokens
pub struct CredentialProvider {
    http: reqwest::Client,
    environment: AmbientEnvironment,
    source: OnceCell<CredentialSource>,
    cached: RwLock<Option<AccessToken>>,
}

impl CredentialProvider {
    pub fn new(environment: AmbientEnvironment, http: reqwest::Client) -> Self {
        Self {
            http,
            environment,
            source: OnceCell::new(),
            cached: RwLock::new(None),
        }
    }

    /// Return a valid access token, discovering the identity on first use
    pub async fn get_credentials(&self) -> Result<AccessToken, AuthError> {
        // Fast path
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref()
                && token.is_fresh(Utc::now())
            {
                return Ok(token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref()
            && token.is_fresh(Utc::now())
        {
            return Ok(token.clone());
        }

        let source = self
            .source
            .get_or_try_init(|| CredentialSource::discover(&self.environment))
            .await?;

        debug!(kind = %source.kind(), "Fetching access token");
        let token = source.fetch_token(&self.http).await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Which kind of identity was discovered, if discovery already ran
    pub fn kind(&self) -> Option<CredentialKind> {
        self.source.get().map(CredentialSource::kind)
    }
}

impl fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("environment", &self.environment.credentials_file)
            .field("kind", &self.kind())
            .finish()
    }
}

#[async_trait]
impl TokenProvider for CredentialProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        self.get_credentials().await
    }
}
