use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{Firewall, Image, Instance, ListResponse, Operation, Tags};
use crate::error::Result;
use crate::http::{ApiClient, segment};

/// Public Compute Engine v1 endpoint
pub const COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Thin client over the Compute Engine v1 REST API for one project
#[derive(Debug, Clone)]
pub struct ComputeClient {
    api: ApiClient,
    project: String,
}

impl ComputeClient {
    pub fn new(api: ApiClient, project: impl Into<String>) -> Self {
        Self {
            api,
            project: project.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn zone_path(&self, zone: &str) -> String {
        format!(
            "projects/{}/zones/{}/instances",
            segment(&self.project),
            segment(zone)
        )
    }

    fn instance_path(&self, zone: &str, name: &str) -> String {
        format!("{}/{}", self.zone_path(zone), segment(name))
    }

    fn firewalls_path(&self) -> String {
        format!("projects/{}/global/firewalls", segment(&self.project))
    }

    /// Follow `nextPageToken` until every item has been collected
    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = match page_token.as_deref() {
                Some(token) => vec![("pageToken", token)],
                None => Vec::new(),
            };
            let page: ListResponse<T> = self.api.get(path, &query).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(path, count = items.len(), "Listed Compute resources");
        Ok(items)
    }

    pub async fn list_instances(&self, zone: &str) -> Result<Vec<Instance>> {
        self.list_all(&self.zone_path(zone)).await
    }

    pub async fn get_instance(&self, zone: &str, name: &str) -> Result<Instance> {
        self.api.get(&self.instance_path(zone, name), &[]).await
    }

    pub async fn insert_instance<B: Serialize + ?Sized>(
        &self,
        zone: &str,
        instance: &B,
    ) -> Result<Operation> {
        self.api.post(&self.zone_path(zone), &[], instance).await
    }

    pub async fn delete_instance(&self, zone: &str, name: &str) -> Result<Operation> {
        self.api.delete(&self.instance_path(zone, name)).await
    }

    pub async fn start_instance(&self, zone: &str, name: &str) -> Result<Operation> {
        let path = format!("{}/start", self.instance_path(zone, name));
        self.api.post_empty(&path).await
    }

    pub async fn stop_instance(&self, zone: &str, name: &str) -> Result<Operation> {
        let path = format!("{}/stop", self.instance_path(zone, name));
        self.api.post_empty(&path).await
    }

    /// Replace network tags; `tags.fingerprint` must be the current one
    pub async fn set_tags(&self, zone: &str, name: &str, tags: &Tags) -> Result<Operation> {
        let path = format!("{}/setTags", self.instance_path(zone, name));
        self.api.post(&path, &[], tags).await
    }

    /// Newest non-deprecated image in a family
    pub async fn image_from_family(&self, image_project: &str, family: &str) -> Result<Image> {
        let path = format!(
            "projects/{}/global/images/family/{}",
            segment(image_project),
            segment(family)
        );
        self.api.get(&path, &[]).await
    }

    pub async fn list_firewalls(&self) -> Result<Vec<Firewall>> {
        self.list_all(&self.firewalls_path()).await
    }

    pub async fn insert_firewall(&self, firewall: &Firewall) -> Result<Operation> {
        self.api.post(&self.firewalls_path(), &[], firewall).await
    }

    pub async fn delete_firewall(&self, name: &str) -> Result<Operation> {
        let path = format!("{}/{}", self.firewalls_path(), segment(name));
        self.api.delete(&path).await
    }

    /// URL form of the project's default network
    pub fn default_network(&self) -> String {
        format!("projects/{}/global/networks/default", self.project)
    }

    /// Partial URL of a machine type in a zone
    pub fn machine_type_url(&self, zone: &str, machine_type: &str) -> String {
        format!("zones/{}/machineTypes/{}", zone, machine_type)
    }
}
