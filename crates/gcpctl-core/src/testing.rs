//! Mock Google Cloud APIs for tests
//!
//! [`MockGcpServer`] wraps a `wiremock` server that serves both the Compute
//! Engine and Cloud Run paths, plus fixture builders for their payloads.
//!
//! ```rust,ignore
//! let server = MockGcpServer::start().await;
//! server
//!     .mock_instances_list("us-central1-a", vec![InstanceFixture::new("vm1").build()])
//!     .await;
//!
//! let context = server.context();
//! let result = gcpctl_core::ops::compute::list_instances(&context, None).await;
//! ```

use std::sync::Arc;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::auth::StaticTokenProvider;
use crate::config::Settings;
use crate::context::CloudContext;

/// Project id used by [`MockGcpServer::settings`]
pub const TEST_PROJECT: &str = "test-project";

/// A mock server answering Compute (`/compute/v1`) and Cloud Run (`/v2`) calls
pub struct MockGcpServer {
    server: MockServer,
}

impl MockGcpServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn compute_endpoint(&self) -> String {
        format!("{}/compute/v1", self.server.uri())
    }

    pub fn run_endpoint(&self) -> String {
        format!("{}/v2", self.server.uri())
    }

    /// Settings for [`TEST_PROJECT`] with default zone and region
    pub fn settings() -> Settings {
        Settings::new(TEST_PROJECT)
    }

    /// Context with default test settings and a static token
    pub fn context(&self) -> CloudContext {
        self.context_with(Self::settings())
    }

    pub fn context_with(&self, settings: Settings) -> CloudContext {
        CloudContext::builder(settings)
            .token_provider(Arc::new(StaticTokenProvider::new("test-token")))
            .compute_endpoint(self.compute_endpoint())
            .run_endpoint(self.run_endpoint())
            .build()
            .expect("mock context builds")
    }

    // ------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------

    pub fn instances_path(zone: &str) -> String {
        format!("/compute/v1/projects/{}/zones/{}/instances", TEST_PROJECT, zone)
    }

    pub fn instance_path(zone: &str, name: &str) -> String {
        format!("{}/{}", Self::instances_path(zone), name)
    }

    pub fn firewalls_path() -> String {
        format!("/compute/v1/projects/{}/global/firewalls", TEST_PROJECT)
    }

    pub fn services_path(region: &str) -> String {
        format!("/v2/projects/{}/locations/{}/services", TEST_PROJECT, region)
    }

    pub fn service_path(region: &str, name: &str) -> String {
        format!("{}/{}", Self::services_path(region), name)
    }

    async fn mount(&self, verb: &str, at: String, status: u16, body: Value) {
        Mock::given(method(verb))
            .and(path(at))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Follow-up pages match on `pageToken` and take precedence over the first page
    async fn mount_page(&self, at: String, page_token: Option<&str>, body: Value) {
        let response = ResponseTemplate::new(200).set_body_json(body);
        match page_token {
            Some(token) => {
                Mock::given(method("GET"))
                    .and(path(at))
                    .and(query_param("pageToken", token))
                    .respond_with(response)
                    .with_priority(1)
                    .mount(&self.server)
                    .await
            }
            None => {
                Mock::given(method("GET"))
                    .and(path(at))
                    .respond_with(response)
                    .mount(&self.server)
                    .await
            }
        }
    }

    // ------------------------------------------------------------------
    // Compute Engine
    // ------------------------------------------------------------------

    pub async fn mock_instances_list(&self, zone: &str, instances: Vec<Value>) {
        self.mount("GET", Self::instances_path(zone), 200, json!({ "items": instances }))
            .await;
    }

    /// One page of a paginated instance listing. `page_token` is the token the
    /// page is requested with, `next` the token it hands out.
    pub async fn mock_instances_page(
        &self,
        zone: &str,
        instances: Vec<Value>,
        page_token: Option<&str>,
        next: Option<&str>,
    ) {
        let body = json!({ "items": instances, "nextPageToken": next });
        self.mount_page(Self::instances_path(zone), page_token, body).await;
    }

    pub async fn mock_instance_get(&self, zone: &str, name: &str, instance: Value) {
        self.mount("GET", Self::instance_path(zone, name), 200, instance).await;
    }

    pub async fn mock_instance_insert(&self, zone: &str, operation: Value) {
        self.mount("POST", Self::instances_path(zone), 200, operation).await;
    }

    pub async fn mock_instance_delete(&self, zone: &str, name: &str, operation: Value) {
        self.mount("DELETE", Self::instance_path(zone, name), 200, operation)
            .await;
    }

    /// `action` is `start`, `stop` or `setTags`
    pub async fn mock_instance_action(
        &self,
        zone: &str,
        name: &str,
        action: &str,
        operation: Value,
    ) {
        let at = format!("{}/{}", Self::instance_path(zone, name), action);
        self.mount("POST", at, 200, operation).await;
    }

    pub async fn mock_image_family(&self, image_project: &str, family: &str) {
        let at = format!(
            "/compute/v1/projects/{}/global/images/family/{}",
            image_project, family
        );
        let body = json!({
            "name": format!("{}-v20250101", family),
            "family": family,
            "selfLink": format!(
                "https://www.googleapis.com/compute/v1/projects/{}/global/images/{}-v20250101",
                image_project, family
            )
        });
        self.mount("GET", at, 200, body).await;
    }

    pub async fn mock_firewalls_list(&self, rules: Vec<Value>) {
        self.mount("GET", Self::firewalls_path(), 200, json!({ "items": rules }))
            .await;
    }

    pub async fn mock_firewall_insert(&self, operation: Value) {
        self.mount("POST", Self::firewalls_path(), 200, operation).await;
    }

    pub async fn mock_firewall_delete(&self, name: &str, operation: Value) {
        let at = format!("{}/{}", Self::firewalls_path(), name);
        self.mount("DELETE", at, 200, operation).await;
    }

    // ------------------------------------------------------------------
    // Cloud Run
    // ------------------------------------------------------------------

    pub async fn mock_services_list(&self, region: &str, services: Vec<Value>) {
        self.mount("GET", Self::services_path(region), 200, json!({ "services": services }))
            .await;
    }

    /// One page of a paginated service listing
    pub async fn mock_services_page(
        &self,
        region: &str,
        services: Vec<Value>,
        page_token: Option<&str>,
        next: Option<&str>,
    ) {
        let body = json!({ "services": services, "nextPageToken": next });
        self.mount_page(Self::services_path(region), page_token, body).await;
    }

    pub async fn mock_service_get(&self, region: &str, name: &str, service: Value) {
        self.mount("GET", Self::service_path(region, name), 200, service).await;
    }

    /// Create-or-update (`allowMissing=true`)
    pub async fn mock_service_deploy(&self, region: &str, name: &str, operation: Value) {
        Mock::given(method("PATCH"))
            .and(path(Self::service_path(region, name)))
            .and(query_param("allowMissing", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(operation))
            .mount(&self.server)
            .await;
    }

    /// Traffic-only patch (`updateMask=traffic`)
    pub async fn mock_service_traffic(&self, region: &str, name: &str, operation: Value) {
        Mock::given(method("PATCH"))
            .and(path(Self::service_path(region, name)))
            .and(query_param("updateMask", "traffic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(operation))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_service_delete(&self, region: &str, name: &str, operation: Value) {
        self.mount("DELETE", Self::service_path(region, name), 200, operation)
            .await;
    }

    // ------------------------------------------------------------------
    // Errors and inspection
    // ------------------------------------------------------------------

    /// Answer `verb at` with a Google error envelope
    pub async fn mock_error(&self, verb: &str, at: String, status: u16, message: &str) {
        self.mount(verb, at, status, google_error(status, message)).await;
    }

    /// JSON bodies of received requests matching `verb` and `at`
    pub async fn received_bodies(&self, verb: &str, at: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == verb && r.url.path() == at)
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }

    /// Number of requests received so far
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or_default()
    }
}

/// `{"error": {"code", "message", "status"}}`
pub fn google_error(status: u16, message: &str) -> Value {
    let reason = match status {
        400 => "INVALID_ARGUMENT",
        401 => "UNAUTHENTICATED",
        403 => "PERMISSION_DENIED",
        404 => "NOT_FOUND",
        409 => "ALREADY_EXISTS",
        429 => "RESOURCE_EXHAUSTED",
        _ => "INTERNAL",
    };
    json!({ "error": { "code": status, "message": message, "status": reason } })
}

/// Compute operation with the given status (`PENDING`, `RUNNING`, `DONE`)
pub fn compute_operation(name: &str, status: &str) -> Value {
    json!({ "kind": "compute#operation", "name": name, "status": status })
}

/// Cloud Run long-running operation
pub fn run_operation(name: &str, done: bool) -> Value {
    json!({
        "name": format!("projects/{}/locations/us-central1/operations/{}", TEST_PROJECT, name),
        "done": done
    })
}

/// Builder for Compute instance payloads
#[derive(Debug, Clone)]
pub struct InstanceFixture {
    name: String,
    status: String,
    zone: String,
    machine_type: String,
    labels: Value,
    tags: Vec<String>,
    external_ip: Option<String>,
}

impl InstanceFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: "RUNNING".to_string(),
            zone: "us-central1-a".to_string(),
            machine_type: "e2-micro".to_string(),
            labels: json!({}),
            tags: Vec::new(),
            external_ip: None,
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn zone(mut self, zone: &str) -> Self {
        self.zone = zone.to_string();
        self
    }

    pub fn machine_type(mut self, machine_type: &str) -> Self {
        self.machine_type = machine_type.to_string();
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        if let Some(map) = self.labels.as_object_mut() {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
        self
    }

    /// `managed-by=mcp` with the given `created-at` and `ttl`
    pub fn managed(self, created_at: &str, ttl: &str) -> Self {
        self.label("managed-by", "mcp")
            .label("created-at", created_at)
            .label("ttl", ttl)
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn external_ip(mut self, ip: &str) -> Self {
        self.external_ip = Some(ip.to_string());
        self
    }

    pub fn build(self) -> Value {
        let base = "https://www.googleapis.com/compute/v1";
        let access_configs = match &self.external_ip {
            Some(ip) => json!([{ "type": "ONE_TO_ONE_NAT", "name": "External NAT", "natIP": ip }]),
            None => json!([]),
        };
        let machine_type = format!(
            "{}/projects/{}/zones/{}/machineTypes/{}",
            base, TEST_PROJECT, self.zone, self.machine_type
        );
        let ssh_keys = json!([{ "key": "ssh-keys", "value": "gcp-user:ssh-rsa AAAA" }]);
        json!({
            "kind": "compute#instance",
            "id": "1234567890",
            "name": self.name,
            "status": self.status,
            "zone": format!("{}/projects/{}/zones/{}", base, TEST_PROJECT, self.zone),
            "machineType": machine_type,
            "creationTimestamp": "2025-01-17T06:30:00.000-08:00",
            "networkInterfaces": [{
                "network": format!("{}/projects/{}/global/networks/default", base, TEST_PROJECT),
                "networkIP": "10.128.0.2",
                "accessConfigs": access_configs
            }],
            "disks": [{ "deviceName": "persistent-disk-0", "boot": true, "diskSizeGb": "10" }],
            "labels": self.labels,
            "tags": { "items": self.tags, "fingerprint": "42WmSpB8rSM=" },
            "metadata": { "fingerprint": "abc=", "items": ssh_keys }
        })
    }
}

/// Builder for Cloud Run v2 service payloads
#[derive(Debug, Clone)]
pub struct ServiceFixture {
    name: String,
    region: String,
    image: String,
    ready: bool,
    labels: Value,
    traffic: Vec<Value>,
}

impl ServiceFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            region: "us-central1".to_string(),
            image: format!("gcr.io/{}/{}:latest", TEST_PROJECT, name),
            ready: true,
            labels: json!({}),
            traffic: Vec::new(),
        }
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    pub fn failed(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        if let Some(map) = self.labels.as_object_mut() {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
        self
    }

    pub fn managed(self, created_at: &str, ttl: &str) -> Self {
        self.label("managed-by", "mcp")
            .label("created-at", created_at)
            .label("ttl", ttl)
    }

    /// Observed traffic share for a revision
    pub fn traffic(mut self, revision: &str, percent: u32) -> Self {
        self.traffic.push(json!({
            "type": "TRAFFIC_TARGET_ALLOCATION_TYPE_REVISION",
            "revision": revision,
            "percent": percent
        }));
        self
    }

    pub fn build(self) -> Value {
        let full_name = format!(
            "projects/{}/locations/{}/services/{}",
            TEST_PROJECT, self.region, self.name
        );
        let latest = format!(
            "projects/{}/locations/{}/revisions/{}-00001-abc",
            TEST_PROJECT, self.region, self.name
        );
        let state = if self.ready { "CONDITION_SUCCEEDED" } else { "CONDITION_FAILED" };
        json!({
            "name": full_name,
            "uid": "6f6a8a1e-0000-0000-0000-000000000000",
            "labels": self.labels,
            "createTime": "2025-01-17T14:30:00Z",
            "updateTime": "2025-01-17T14:35:00Z",
            "template": {
                "scaling": { "minInstanceCount": 0, "maxInstanceCount": 100 },
                "containers": [{
                    "image": self.image,
                    "env": [{ "name": "MODE", "value": "prod" }],
                    "resources": { "limits": { "memory": "512Mi", "cpu": "1" } }
                }]
            },
            "traffic": [{ "type": "TRAFFIC_TARGET_ALLOCATION_TYPE_LATEST", "percent": 100 }],
            "trafficStatuses": self.traffic,
            "uri": format!("https://{}-abc123-uc.a.run.app", self.name),
            "latestReadyRevision": latest,
            "latestCreatedRevision": latest,
            "terminalCondition": { "type": "Ready", "state": state }
        })
    }
}
