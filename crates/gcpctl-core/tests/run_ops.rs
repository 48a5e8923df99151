//! Cloud Run operations against a mock API

use std::collections::BTreeMap;

use gcpctl_core::ops::run::{self, DeployServiceParams};
use gcpctl_core::testing::{MockGcpServer, ServiceFixture, run_operation};
use gcpctl_core::OperationResult;
use pretty_assertions::assert_eq;
use serde_json::json;

fn split(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[tokio::test]
async fn test_list_services_default_region() {
    let server = MockGcpServer::start().await;
    server
        .mock_services_list(
            "us-central1",
            vec![
                ServiceFixture::new("api").build(),
                ServiceFixture::new("worker").failed().build(),
            ],
        )
        .await;

    let result = run::list_services(&server.context(), None).await;
    let list = result.details().expect("success");
    assert_eq!(list.region, "us-central1");
    assert_eq!(list.count, 2);
    assert_eq!(list.services[0].name, "api");
    assert_eq!(list.services[0].status, "Ready");
    assert_eq!(list.services[0].latest_ready_revision.as_deref(), Some("api-00001-abc"));
    assert_eq!(list.services[1].status, "Failed");
}

#[tokio::test]
async fn test_list_services_region_override() {
    let server = MockGcpServer::start().await;
    server
        .mock_services_list(
            "europe-west1",
            vec![ServiceFixture::new("eu-api").region("europe-west1").build()],
        )
        .await;

    let result = run::list_services(&server.context(), Some("europe-west1")).await;
    let list = result.details().expect("success");
    assert_eq!(list.region, "europe-west1");
    assert_eq!(list.services[0].name, "eu-api");
}

#[tokio::test]
async fn test_deploy_service_sends_full_template() {
    let server = MockGcpServer::start().await;
    server
        .mock_service_deploy("us-central1", "api", run_operation("deploy-1", false))
        .await;

    let mut params = DeployServiceParams::new("api", "gcr.io/test-project/api:v2");
    params.memory = "1Gi".to_string();
    params.cpu = "2".to_string();
    params.min_instances = 1;
    params.max_instances = 5;
    params.env_vars = Some(BTreeMap::from([("MODE".to_string(), "prod".to_string())]));
    params.ttl = "never".to_string();

    let result = run::deploy_service(&server.context(), &params).await;
    assert_eq!(result.status(), "pending");
    let deployed = result.details().unwrap();
    assert_eq!(deployed.service_name, "api");
    assert_eq!(deployed.region, "us-central1");
    assert_eq!(deployed.labels["ttl"], "never");
    assert_eq!(deployed.labels["managed-by"], "mcp");

    let bodies = server
        .received_bodies("PATCH", &MockGcpServer::service_path("us-central1", "api"))
        .await;
    assert_eq!(bodies.len(), 1);
    let template = &bodies[0]["template"];
    assert_eq!(template["scaling"], json!({"minInstanceCount": 1, "maxInstanceCount": 5}));
    assert_eq!(template["containers"][0]["image"], "gcr.io/test-project/api:v2");
    assert_eq!(template["containers"][0]["env"], json!([{"name": "MODE", "value": "prod"}]));
    assert_eq!(
        template["containers"][0]["resources"]["limits"],
        json!({"cpu": "2", "memory": "1Gi"})
    );
}

#[tokio::test]
async fn test_deploy_service_rejects_inverted_scaling() {
    let server = MockGcpServer::start().await;
    let mut params = DeployServiceParams::new("api", "nginx");
    params.min_instances = 10;
    params.max_instances = 2;

    match run::deploy_service(&server.context(), &params).await {
        OperationResult::Error { error, context, .. } => {
            assert!(error.contains("must not exceed max_instances"));
            assert_eq!(context["service_name"], "api");
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(server.request_count().await, 0);
}

#[tokio::test]
async fn test_deploy_service_failed_operation() {
    let server = MockGcpServer::start().await;
    server
        .mock_service_deploy(
            "us-central1",
            "api",
            json!({
                "name": "projects/test-project/locations/us-central1/operations/deploy-2",
                "done": true,
                "error": {"code": 3, "message": "Image 'nginx:nope' not found"}
            }),
        )
        .await;

    let params = DeployServiceParams::new("api", "nginx:nope");
    match run::deploy_service(&server.context(), &params).await {
        OperationResult::Error { message, error, .. } => {
            assert_eq!(message, "Operation on service api failed");
            assert!(error.contains("nginx:nope"));
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_service_details() {
    let server = MockGcpServer::start().await;
    server
        .mock_service_get(
            "us-central1",
            "api",
            ServiceFixture::new("api")
                .traffic("api-00001-abc", 90)
                .traffic("api-00002-def", 10)
                .label("env", "prod")
                .build(),
        )
        .await;

    let result = run::get_service_details(&server.context(), "api", None).await;
    let details = &result.details().expect("success").service;
    assert_eq!(details.status, "Ready");
    assert_eq!(details.memory.as_deref(), Some("512Mi"));
    assert_eq!(details.env_vars, vec!["MODE".to_string()]);
    assert_eq!(details.revisions, vec!["api-00001-abc".to_string(), "api-00002-def".to_string()]);
    assert_eq!(details.traffic.len(), 2);
    assert_eq!(details.traffic[0].percent, 90);
    assert_eq!(details.labels["env"], "prod");
}

#[tokio::test]
async fn test_delete_service_not_found() {
    let server = MockGcpServer::start().await;
    server
        .mock_error(
            "DELETE",
            MockGcpServer::service_path("us-central1", "ghost"),
            404,
            "Resource 'ghost' of kind 'SERVICE' does not exist.",
        )
        .await;

    match run::delete_service(&server.context(), "ghost", None).await {
        OperationResult::Error { error, context, .. } => {
            assert!(error.contains("service ghost not found"));
            assert_eq!(context["region"], "us-central1");
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_service_done() {
    let server = MockGcpServer::start().await;
    server
        .mock_service_delete("asia-east1", "api", run_operation("delete-1", true))
        .await;

    let result = run::delete_service(&server.context(), "api", Some("asia-east1")).await;
    assert_eq!(result.status(), "success");
    assert_eq!(result.details().unwrap().region, "asia-east1");
}

#[tokio::test]
async fn test_update_traffic_patches_traffic_only() {
    let server = MockGcpServer::start().await;
    server
        .mock_service_traffic("us-central1", "api", run_operation("traffic-1", false))
        .await;

    let result = run::update_traffic(
        &server.context(),
        "api",
        &split(&[("api-00001-abc", 80), ("LATEST", 20)]),
        None,
    )
    .await;
    assert_eq!(result.status(), "pending");
    assert_eq!(result.details().unwrap().traffic.len(), 2);

    let bodies = server
        .received_bodies("PATCH", &MockGcpServer::service_path("us-central1", "api"))
        .await;
    let traffic = &bodies[0]["traffic"];
    assert_eq!(traffic[0]["type"], "TRAFFIC_TARGET_ALLOCATION_TYPE_LATEST");
    assert_eq!(traffic[0]["percent"], 20);
    assert_eq!(traffic[1]["type"], "TRAFFIC_TARGET_ALLOCATION_TYPE_REVISION");
    assert_eq!(traffic[1]["revision"], "api-00001-abc");
    assert!(bodies[0].get("template").is_none());
}

#[tokio::test]
async fn test_update_traffic_bad_split_makes_no_call() {
    let server = MockGcpServer::start().await;

    for bad in [split(&[("a", 50), ("b", 30)]), split(&[("a", 150), ("b", -50)]), split(&[])] {
        let result = run::update_traffic(&server.context(), "api", &bad, None).await;
        assert!(result.is_error());
    }
    assert_eq!(server.request_count().await, 0);
}

#[tokio::test]
async fn test_list_services_follows_page_tokens() {
    let server = MockGcpServer::start().await;
    server
        .mock_services_page(
            "us-central1",
            vec![ServiceFixture::new("api").build()],
            None,
            Some("next"),
        )
        .await;
    server
        .mock_services_page(
            "us-central1",
            vec![ServiceFixture::new("worker").build()],
            Some("next"),
            None,
        )
        .await;

    let result = run::list_services(&server.context(), None).await;
    let list = result.details().expect("success");
    assert_eq!(list.count, 2);
    assert_eq!(list.services[0].name, "api");
    assert_eq!(list.services[1].name, "worker");
}

#[tokio::test]
async fn test_deploy_service_reports_url_once_ready() {
    let server = MockGcpServer::start().await;
    server
        .mock_service_deploy("us-central1", "api", run_operation("deploy-2", true))
        .await;
    server
        .mock_service_get("us-central1", "api", ServiceFixture::new("api").build())
        .await;

    let params = DeployServiceParams::new("api", "gcr.io/test-project/api:v3");
    let result = run::deploy_service(&server.context(), &params).await;
    assert_eq!(result.status(), "success");
    let deployed = result.details().unwrap();
    assert_eq!(deployed.url.as_deref(), Some("https://api-abc123-uc.a.run.app"));
}

#[tokio::test]
async fn test_deploy_service_without_url_yet() {
    let server = MockGcpServer::start().await;
    server
        .mock_service_deploy("us-central1", "api", run_operation("deploy-3", false))
        .await;

    let params = DeployServiceParams::new("api", "gcr.io/test-project/api:v3");
    let result = run::deploy_service(&server.context(), &params).await;
    assert_eq!(result.status(), "pending");
    assert!(result.details().unwrap().url.is_none());
}

#[tokio::test]
async fn test_update_traffic_rejects_duplicate_revision() {
    let server = MockGcpServer::start().await;

    let split = split(&[("LATEST", 50), ("latest", 50)]);
    match run::update_traffic(&server.context(), "api", &split, None).await {
        OperationResult::Error { error, .. } => {
            assert!(error.contains("appears more than once"));
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(server.request_count().await, 0);
}
