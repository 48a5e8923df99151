use tracing::debug;

use super::types::{ListServicesResponse, Operation, Service};
use crate::error::Result;
use crate::http::{ApiClient, segment};

/// Public Cloud Run Admin v2 endpoint
pub const RUN_ENDPOINT: &str = "https://run.googleapis.com/v2";

/// Thin client over the Cloud Run Admin v2 REST API for one project
#[derive(Debug, Clone)]
pub struct RunClient {
    api: ApiClient,
    project: String,
}

impl RunClient {
    pub fn new(api: ApiClient, project: impl Into<String>) -> Self {
        Self {
            api,
            project: project.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn services_path(&self, region: &str) -> String {
        format!(
            "projects/{}/locations/{}/services",
            segment(&self.project),
            segment(region)
        )
    }

    fn service_path(&self, region: &str, name: &str) -> String {
        format!("{}/{}", self.services_path(region), segment(name))
    }

    pub async fn list_services(&self, region: &str) -> Result<Vec<Service>> {
        let path = self.services_path(region);
        let mut services = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = match page_token.as_deref() {
                Some(token) => vec![("pageToken", token)],
                None => Vec::new(),
            };
            let page: ListServicesResponse = self.api.get(&path, &query).await?;
            services.extend(page.services);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(region, count = services.len(), "Listed Cloud Run services");
        Ok(services)
    }

    pub async fn get_service(&self, region: &str, name: &str) -> Result<Service> {
        self.api.get(&self.service_path(region, name), &[]).await
    }

    /// Create the service or replace its spec
    pub async fn create_or_update_service(
        &self,
        region: &str,
        name: &str,
        service: &Service,
    ) -> Result<Operation> {
        self.api
            .patch(
                &self.service_path(region, name),
                &[("allowMissing", "true")],
                service,
            )
            .await
    }

    /// Patch only the `traffic` field
    pub async fn update_traffic(
        &self,
        region: &str,
        name: &str,
        service: &Service,
    ) -> Result<Operation> {
        self.api
            .patch(
                &self.service_path(region, name),
                &[("updateMask", "traffic")],
                service,
            )
            .await
    }

    pub async fn delete_service(&self, region: &str, name: &str) -> Result<Operation> {
        self.api.delete(&self.service_path(region, name)).await
    }
}
