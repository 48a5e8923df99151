//! Compute Engine operations against a mock API

use std::collections::BTreeMap;
use std::sync::Arc;

use gcpctl_core::ops::compute::{self, CreateInstanceParams};
use gcpctl_core::testing::{InstanceFixture, MockGcpServer, compute_operation};
use gcpctl_core::{CloudContext, OperationResult, Settings, StaticTokenProvider};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_list_instances_default_zone() {
    let server = MockGcpServer::start().await;
    server
        .mock_instances_list(
            "us-central1-a",
            vec![
                InstanceFixture::new("vm1").external_ip("34.1.2.3").build(),
                InstanceFixture::new("vm2").status("TERMINATED").build(),
            ],
        )
        .await;

    let result = compute::list_instances(&server.context(), None).await;
    let list = result.details().expect("success");
    assert_eq!(list.zone, "us-central1-a");
    assert_eq!(list.count, 2);
    assert_eq!(list.instances[0].name, "vm1");
    assert_eq!(list.instances[0].external_ip.as_deref(), Some("34.1.2.3"));
    assert_eq!(list.instances[1].status, "TERMINATED");
    assert_eq!(result.message(), "Found 2 instances in zone us-central1-a");
}

#[tokio::test]
async fn test_list_instances_zone_override() {
    let server = MockGcpServer::start().await;
    server
        .mock_instances_list(
            "europe-west1-b",
            vec![InstanceFixture::new("eu-vm").zone("europe-west1-b").build()],
        )
        .await;

    let result = compute::list_instances(&server.context(), Some("europe-west1-b")).await;
    let list = result.details().expect("success");
    assert_eq!(list.zone, "europe-west1-b");
    assert_eq!(list.instances[0].zone, "europe-west1-b");
}

#[tokio::test]
async fn test_list_instances_empty_zone() {
    let server = MockGcpServer::start().await;
    // Compute omits `items` entirely for an empty zone
    server
        .inner()
        .register(
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path(MockGcpServer::instances_path("us-central1-a")))
                .respond_with(
                    wiremock::ResponseTemplate::new(200)
                        .set_body_json(json!({"kind": "compute#instanceList"})),
                ),
        )
        .await;

    let result = compute::list_instances(&server.context(), None).await;
    assert_eq!(result.details().map(|l| l.count), Some(0));
}

#[tokio::test]
async fn test_list_instances_server_error() {
    let server = MockGcpServer::start().await;
    server
        .mock_error("GET", MockGcpServer::instances_path("us-central1-a"), 500, "backend error")
        .await;

    match compute::list_instances(&server.context(), None).await {
        OperationResult::Error {
            message, context, ..
        } => {
            assert_eq!(message, "Failed to list instances in zone us-central1-a");
            assert_eq!(context["zone"], "us-central1-a");
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_start_instance_pending() {
    let server = MockGcpServer::start().await;
    server
        .mock_instance_action(
            "us-central1-a",
            "vm1",
            "start",
            compute_operation("operation-123", "RUNNING"),
        )
        .await;

    let result = compute::start_instance(&server.context(), "vm1", None).await;
    assert_eq!(result.status(), "pending");
    let op = result.details().unwrap();
    assert_eq!(op.operation_id, "operation-123");
    assert_eq!(op.instance_name, "vm1");
    assert_eq!(op.zone, "us-central1-a");
}

#[tokio::test]
async fn test_stop_instance_done() {
    let server = MockGcpServer::start().await;
    server
        .mock_instance_action("us-west1-b", "vm1", "stop", compute_operation("operation-9", "DONE"))
        .await;

    let result = compute::stop_instance(&server.context(), "vm1", Some("us-west1-b")).await;
    assert_eq!(result.status(), "success");
    assert_eq!(result.message(), "Instance vm1 stopped");
}

#[tokio::test]
async fn test_stop_instance_forbidden() {
    let server = MockGcpServer::start().await;
    server
        .mock_error(
            "POST",
            format!("{}/stop", MockGcpServer::instance_path("us-central1-a", "vm1")),
            403,
            "Required 'compute.instances.stop' permission",
        )
        .await;

    match compute::stop_instance(&server.context(), "vm1", None).await {
        OperationResult::Error { error, context, .. } => {
            assert!(error.contains("compute.instances.stop"));
            assert_eq!(context["instance_name"], "vm1");
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_instance_details() {
    let server = MockGcpServer::start().await;
    server
        .mock_instance_get(
            "us-central1-a",
            "vm1",
            InstanceFixture::new("vm1")
                .managed("20250117-143000", "7d")
                .tags(&["minecraft"])
                .external_ip("34.1.2.3")
                .build(),
        )
        .await;

    let result = compute::get_instance_details(&server.context(), "vm1", None).await;
    let details = &result.details().expect("success").instance;
    assert_eq!(details.name, "vm1");
    assert_eq!(details.machine_type, "e2-micro");
    assert_eq!(details.external_ip.as_deref(), Some("34.1.2.3"));
    assert_eq!(details.tags, vec!["minecraft".to_string()]);
    assert_eq!(details.labels.get("ttl").map(String::as_str), Some("7d"));
}

#[tokio::test]
async fn test_get_instance_details_not_found() {
    let server = MockGcpServer::start().await;
    server
        .mock_error(
            "GET",
            MockGcpServer::instance_path("us-central1-a", "ghost"),
            404,
            "The resource 'projects/test-project/zones/us-central1-a/instances/ghost' was not found",
        )
        .await;

    match compute::get_instance_details(&server.context(), "ghost", None).await {
        OperationResult::Error { error, .. } => assert!(error.contains("instance ghost not found")),
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_instance_with_ssh_key() {
    let server = MockGcpServer::start().await;
    server.mock_image_family("debian-cloud", "debian-12").await;
    server
        .mock_instance_insert("us-central1-a", compute_operation("operation-create", "RUNNING"))
        .await;

    let mut params = CreateInstanceParams::new("mc-server");
    params.ssh_public_key = Some("ssh-ed25519 AAAAC3 me@laptop".to_string());
    params.network_tags = vec!["minecraft".to_string()];
    params.labels = Some(BTreeMap::from([
        ("env".to_string(), "dev".to_string()),
        ("managed-by".to_string(), "someone-else".to_string()),
    ]));
    params.ttl = "24h".to_string();

    let result = compute::create_instance(&server.context(), &params).await;
    assert_eq!(result.status(), "pending");
    let created = result.details().unwrap();
    assert_eq!(created.operation_id, "operation-create");
    assert_eq!(created.zone, "us-central1-a");
    assert_eq!(created.labels["managed-by"], "mcp");
    assert_eq!(created.labels["ttl"], "24h");
    assert_eq!(created.labels["env"], "dev");

    let bodies = server
        .received_bodies("POST", &MockGcpServer::instances_path("us-central1-a"))
        .await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["name"], "mc-server");
    assert_eq!(body["machineType"], "zones/us-central1-a/machineTypes/e2-micro");
    assert_eq!(
        body["disks"][0]["initializeParams"]["sourceImage"],
        "https://www.googleapis.com/compute/v1/projects/debian-cloud/global/images/debian-12-v20250101"
    );
    assert_eq!(body["disks"][0]["initializeParams"]["diskSizeGb"], "10");
    assert_eq!(body["networkInterfaces"][0]["accessConfigs"][0]["type"], "ONE_TO_ONE_NAT");
    assert_eq!(
        body["networkInterfaces"][0]["network"],
        "projects/test-project/global/networks/default"
    );
    assert_eq!(body["tags"]["items"], json!(["minecraft"]));
    assert_eq!(body["metadata"]["items"][0]["key"], "ssh-keys");
    assert_eq!(
        body["metadata"]["items"][0]["value"],
        "gcp-user:ssh-ed25519 AAAAC3 me@laptop"
    );
}

#[tokio::test]
async fn test_create_instance_without_ssh_key_omits_metadata() {
    let server = MockGcpServer::start().await;
    server.mock_image_family("ubuntu-os-cloud", "ubuntu-2204-lts").await;
    server
        .mock_instance_insert("us-east1-b", compute_operation("operation-create", "DONE"))
        .await;

    let mut params = CreateInstanceParams::new("plain");
    params.zone = Some("us-east1-b".to_string());
    params.image_project = "ubuntu-os-cloud".to_string();
    params.image_family = "ubuntu-2204-lts".to_string();
    params.machine_type = "e2-standard-2".to_string();

    let result = compute::create_instance(&server.context(), &params).await;
    assert_eq!(result.status(), "success");

    let bodies = server
        .received_bodies("POST", &MockGcpServer::instances_path("us-east1-b"))
        .await;
    let body = &bodies[0];
    assert!(body.get("metadata").is_none());
    assert!(body.get("tags").is_none());
    assert_eq!(body["machineType"], "zones/us-east1-b/machineTypes/e2-standard-2");
}

#[tokio::test]
async fn test_create_instance_rejects_bad_ttl_without_calling_api() {
    let server = MockGcpServer::start().await;

    let mut params = CreateInstanceParams::new("vm1");
    params.ttl = "forever".to_string();

    match compute::create_instance(&server.context(), &params).await {
        OperationResult::Error { error, .. } => assert!(error.contains("Invalid TTL format")),
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(server.request_count().await, 0);
}

#[tokio::test]
async fn test_create_instance_rejects_oversized_ttl() {
    let server = MockGcpServer::start().await;

    let mut params = CreateInstanceParams::new("vm1");
    params.ttl = "4000000000d".to_string();

    match compute::create_instance(&server.context(), &params).await {
        OperationResult::Error { error, context, .. } => {
            assert!(error.contains("exceeds the maximum"));
            assert_eq!(context["instance_name"], "vm1");
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(server.request_count().await, 0);
}

#[tokio::test]
async fn test_create_instance_rejects_zero_disk() {
    let server = MockGcpServer::start().await;

    let mut params = CreateInstanceParams::new("vm1");
    params.disk_size_gb = 0;

    match compute::create_instance(&server.context(), &params).await {
        OperationResult::Error { error, context, .. } => {
            assert!(error.contains("disk_size_gb"));
            assert_eq!(context["instance_name"], "vm1");
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(server.request_count().await, 0);
}

#[tokio::test]
async fn test_create_instance_unknown_image_family() {
    let server = MockGcpServer::start().await;
    server
        .mock_error(
            "GET",
            "/compute/v1/projects/debian-cloud/global/images/family/debian-99".to_string(),
            404,
            "The resource was not found",
        )
        .await;

    let mut params = CreateInstanceParams::new("vm1");
    params.image_family = "debian-99".to_string();

    match compute::create_instance(&server.context(), &params).await {
        OperationResult::Error { message, error, .. } => {
            assert_eq!(message, "Failed to resolve image family debian-cloud/debian-99");
            assert!(error.contains("not found"));
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_instance_not_found() {
    let server = MockGcpServer::start().await;
    server
        .mock_error(
            "DELETE",
            MockGcpServer::instance_path("us-central1-a", "ghost"),
            404,
            "The resource was not found",
        )
        .await;

    match compute::delete_instance(&server.context(), "ghost", None).await {
        OperationResult::Error { message, error, .. } => {
            assert_eq!(message, "Failed to delete instance ghost");
            assert!(error.contains("not found"));
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_blank_instance_name_is_rejected() {
    let server = MockGcpServer::start().await;
    let result = compute::delete_instance(&server.context(), "  ", None).await;
    assert!(result.is_error());
    assert_eq!(server.request_count().await, 0);
}

#[tokio::test]
async fn test_connection_refused_is_an_error_result() {
    let context = CloudContext::builder(Settings::new("test-project"))
        .token_provider(Arc::new(StaticTokenProvider::new("t")))
        .compute_endpoint("http://127.0.0.1:9/compute/v1")
        .build()
        .unwrap();

    let result = compute::list_instances(&context, None).await;
    assert!(result.is_error());
}

#[tokio::test]
async fn test_list_instances_follows_page_tokens() {
    let server = MockGcpServer::start().await;
    server
        .mock_instances_page(
            "us-central1-a",
            vec![InstanceFixture::new("vm1").build()],
            None,
            Some("p2"),
        )
        .await;
    server
        .mock_instances_page(
            "us-central1-a",
            vec![InstanceFixture::new("vm2").build(), InstanceFixture::new("vm3").build()],
            Some("p2"),
            None,
        )
        .await;

    let result = compute::list_instances(&server.context(), None).await;
    let list = result.details().expect("success");
    assert_eq!(list.count, 3);
    let names: Vec<&str> = list.instances.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["vm1", "vm2", "vm3"]);
    assert_eq!(server.request_count().await, 2);
}
