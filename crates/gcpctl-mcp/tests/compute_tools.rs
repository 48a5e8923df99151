//! Integration tests for Compute Engine MCP tools using mock server

mod common;

use common::{call_tool_json, call_tool_text, state};
use gcpctl_core::testing::{InstanceFixture, MockGcpServer, compute_operation};
use gcpctl_mcp::tools::compute;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_list_instances() {
    let server = MockGcpServer::start().await;
    server
        .mock_instances_list(
            "us-central1-a",
            vec![
                InstanceFixture::new("web-1").external_ip("34.1.2.3").build(),
                InstanceFixture::new("batch-1").status("TERMINATED").build(),
            ],
        )
        .await;

    let tool = compute::list_instances(state(&server, false));
    let result = call_tool_json(&tool, json!({})).await;

    assert_eq!(result["status"], "success");
    assert_eq!(result["zone"], "us-central1-a");
    assert_eq!(result["count"], 2);
    let instances = result["instances"].as_array().unwrap();
    assert_eq!(instances[0]["name"], "web-1");
    assert_eq!(instances[0]["external_ip"], "34.1.2.3");
    assert_eq!(instances[1]["status"], "TERMINATED");
}

#[tokio::test]
async fn test_list_instances_zone_argument() {
    let server = MockGcpServer::start().await;
    server
        .mock_instances_list(
            "europe-west4-a",
            vec![InstanceFixture::new("eu-1").zone("europe-west4-a").build()],
        )
        .await;

    let tool = compute::list_instances(state(&server, true));
    let result = call_tool_json(&tool, json!({"zone": "europe-west4-a"})).await;

    assert_eq!(result["zone"], "europe-west4-a");
    assert_eq!(result["instances"][0]["name"], "eu-1");
}

#[tokio::test]
async fn test_list_instances_api_failure_is_error_result() {
    let server = MockGcpServer::start().await;
    server
        .mock_error("GET", MockGcpServer::instances_path("us-central1-a"), 403, "Permission denied")
        .await;

    let tool = compute::list_instances(state(&server, false));
    let result = call_tool_json(&tool, json!({})).await;

    assert_eq!(result["status"], "error");
    assert_eq!(result["message"], "Failed to list instances in zone us-central1-a");
    assert!(result["error"].as_str().unwrap().contains("Permission denied"));
}

#[tokio::test]
async fn test_start_instance_pending() {
    let server = MockGcpServer::start().await;
    server
        .mock_instance_action(
            "us-central1-a",
            "web-1",
            "start",
            compute_operation("operation-1", "RUNNING"),
        )
        .await;

    let tool = compute::start_instance(state(&server, false));
    let result = call_tool_json(&tool, json!({"instance_name": "web-1"})).await;

    assert_eq!(result["status"], "pending");
    assert_eq!(result["operation_id"], "operation-1");
    assert_eq!(result["instance_name"], "web-1");
}

#[tokio::test]
async fn test_stop_instance_done() {
    let server = MockGcpServer::start().await;
    server
        .mock_instance_action(
            "us-central1-a",
            "web-1",
            "stop",
            compute_operation("operation-2", "DONE"),
        )
        .await;

    let tool = compute::stop_instance(state(&server, false));
    let result = call_tool_json(&tool, json!({"instance_name": "web-1"})).await;

    assert_eq!(result["status"], "success");
    assert_eq!(result["message"], "Instance web-1 stopped");
}

#[tokio::test]
async fn test_get_instance_details() {
    let server = MockGcpServer::start().await;
    server
        .mock_instance_get(
            "us-central1-a",
            "web-1",
            InstanceFixture::new("web-1")
                .managed("20250101-120000", "7d")
                .tags(&["web"])
                .build(),
        )
        .await;

    let tool = compute::get_instance_details(state(&server, true));
    let result = call_tool_json(&tool, json!({"instance_name": "web-1"})).await;

    assert_eq!(result["status"], "success");
    let instance = &result["instance"];
    assert_eq!(instance["name"], "web-1");
    assert_eq!(instance["labels"]["managed-by"], "mcp");
    assert_eq!(instance["tags"], json!(["web"]));
    assert_eq!(instance["metadata_keys"], json!(["ssh-keys"]));
}

#[tokio::test]
async fn test_create_instance_applies_defaults() {
    let server = MockGcpServer::start().await;
    server.mock_image_family("debian-cloud", "debian-12").await;
    server
        .mock_instance_insert("us-central1-a", compute_operation("operation-create", "RUNNING"))
        .await;

    let tool = compute::create_instance(state(&server, false));
    let result = call_tool_json(
        &tool,
        json!({
            "instance_name": "mc-server",
            "ssh_public_key": "ssh-ed25519 AAAAC3Nza dev@laptop",
            "network_tags": ["minecraft"],
            "labels": {"Team": "Games"}
        }),
    )
    .await;

    assert_eq!(result["status"], "pending");
    assert_eq!(result["machine_type"], "e2-micro");
    assert_eq!(result["labels"]["ttl"], "7d");
    assert_eq!(result["labels"]["team"], "games");

    let bodies = server
        .received_bodies("POST", &MockGcpServer::instances_path("us-central1-a"))
        .await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["tags"]["items"], json!(["minecraft"]));
    assert_eq!(
        bodies[0]["metadata"]["items"][0]["value"],
        "gcp-user:ssh-ed25519 AAAAC3Nza dev@laptop"
    );
}

#[tokio::test]
async fn test_create_instance_invalid_ttl() {
    let server = MockGcpServer::start().await;

    let tool = compute::create_instance(state(&server, false));
    let result = call_tool_json(&tool, json!({"instance_name": "vm", "ttl": "forever"})).await;

    assert_eq!(result["status"], "error");
    assert!(result["error"].as_str().unwrap().contains("Invalid TTL format"));
    assert_eq!(server.request_count().await, 0);
}

#[tokio::test]
async fn test_delete_instance_not_found() {
    let server = MockGcpServer::start().await;
    server
        .mock_error(
            "DELETE",
            MockGcpServer::instance_path("us-central1-a", "ghost"),
            404,
            "The resource 'ghost' was not found",
        )
        .await;

    let tool = compute::delete_instance(state(&server, false));
    let result = call_tool_json(&tool, json!({"instance_name": "ghost"})).await;

    assert_eq!(result["status"], "error");
    assert_eq!(result["message"], "Failed to delete instance ghost");
    assert!(result["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_write_tools_rejected_in_read_only_mode() {
    let server = MockGcpServer::start().await;
    let state = state(&server, true);

    let text = call_tool_text(
        &compute::delete_instance(state.clone()),
        json!({"instance_name": "web-1"}),
    )
    .await;
    assert!(text.contains("read-only mode"), "unexpected reply: {text}");

    let text =
        call_tool_text(&compute::start_instance(state), json!({"instance_name": "web-1"})).await;
    assert!(text.contains("read-only mode"), "unexpected reply: {text}");

    assert_eq!(server.request_count().await, 0);
}
