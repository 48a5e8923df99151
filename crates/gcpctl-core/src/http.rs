//! Authenticated JSON client shared by the Compute and Cloud Run clients
//!
//! Every call fetches a bearer token from the [`TokenProvider`] first, so a
//! missing identity surfaces as [`CoreError::Auth`] before any request is
//! sent. Non-2xx responses are decoded from Google's error envelope.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenProvider;
use crate::error::{CoreError, Result};

/// Default timeout for every outbound request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Encode a single path segment
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// REST client bound to one API base URL
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a path (already segment-encoded) and query pairs against the base URL
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut url = Url::parse(&raw)
            .map_err(|e| CoreError::Validation(format!("invalid request URL {}: {}", raw, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.request(Method::GET, path, query, None::<&()>).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T> {
        self.request(Method::POST, path, query, Some(body)).await
    }

    /// POST with no request body (Compute `start`/`stop` actions)
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::POST, path, &[], None::<&()>).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T> {
        self.request(Method::PATCH, path, query, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, &[], None::<&()>).await
    }

    async fn request<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.url(path, query)?;
        let token = self.tokens.access_token().await?;

        debug!(method = %method, url = %url, "Sending API request");
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(&token.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(method = %method, url = %url, status = status.as_u16(), "API request failed");
            return Err(CoreError::from_response(status.as_u16(), &text));
        }

        // Some deletes answer with an empty body
        let text = if text.trim().is_empty() { "{}" } else { &text };
        serde_json::from_str(text)
            .map_err(|e| CoreError::Decode(format!("{} {}: {}", method, url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(
            reqwest::Client::new(),
            base,
            Arc::new(StaticTokenProvider::new("token")),
        )
    }

    #[test]
    fn test_url_joins_and_encodes_query() {
        let api = client("https://run.googleapis.com/v2/");
        let url = api
            .url(
                "/projects/demo/locations/us-central1/services/web",
                &[("updateMask", "traffic")],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://run.googleapis.com/v2/projects/demo/locations/us-central1/services/web?updateMask=traffic"
        );
    }

    #[test]
    fn test_url_query_values_are_escaped() {
        let api = client("https://compute.googleapis.com/compute/v1");
        let url = api
            .url("projects/demo/zones/a/instances", &[("pageToken", "a b&c")])
            .unwrap();
        assert!(url.as_str().ends_with("pageToken=a+b%26c"));
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("vm-1"), "vm-1");
        assert_eq!(segment("a/b"), "a%2Fb");
    }
}
