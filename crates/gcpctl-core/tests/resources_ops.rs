//! Cross-service aggregation against a mock API

use gcpctl_core::ops::resources;
use gcpctl_core::testing::{InstanceFixture, MockGcpServer, ServiceFixture};
use gcpctl_core::OperationResult;
use pretty_assertions::assert_eq;

async fn populated() -> MockGcpServer {
    let server = MockGcpServer::start().await;
    server
        .mock_instances_list(
            "us-central1-a",
            vec![
                InstanceFixture::new("mc-server").tags(&["minecraft"]).build(),
                InstanceFixture::new("db").status("TERMINATED").label("env", "prod").build(),
            ],
        )
        .await;
    server
        .mock_services_list(
            "us-central1",
            vec![
                ServiceFixture::new("api").label("env", "prod").build(),
                ServiceFixture::new("batch").failed().build(),
            ],
        )
        .await;
    server
}

#[tokio::test]
async fn test_list_all_resources_merges_both_groups() {
    let server = populated().await;

    let result = resources::list_all_resources(&server.context(), None, None).await;
    let all = result.details().expect("success");
    assert_eq!(all.summary.total_resources, 4);
    assert_eq!(all.summary.total_compute_instances, 2);
    assert_eq!(all.summary.total_cloud_run_services, 2);
    assert_eq!(all.summary.project_id, "test-project");
    assert!(all.partial_failures.is_empty());

    let types: Vec<&str> = all.resources.iter().map(|r| r.resource_type.as_str()).collect();
    assert_eq!(
        types,
        vec!["compute_instance", "compute_instance", "cloud_run_service", "cloud_run_service"]
    );
    assert_eq!(
        all.resources[2].endpoint.as_deref(),
        Some("https://api-abc123-uc.a.run.app")
    );
}

#[tokio::test]
async fn test_list_all_resources_reports_partial_failure() {
    let server = MockGcpServer::start().await;
    server
        .mock_instances_list("us-central1-a", vec![InstanceFixture::new("vm1").build()])
        .await;
    server
        .mock_error(
            "GET",
            MockGcpServer::services_path("us-central1"),
            403,
            "Cloud Run API has not been used",
        )
        .await;

    let result = resources::list_all_resources(&server.context(), None, None).await;
    let all = result.details().expect("partial success");
    assert_eq!(all.summary.total_resources, 1);
    assert_eq!(all.partial_failures.len(), 1);
    assert_eq!(all.partial_failures[0].resource_type, "cloud_run_service");
    assert_eq!(all.partial_failures[0].location, "us-central1");
    assert!(all.partial_failures[0].error.contains("Cloud Run API"));
    assert!(result.message().contains("could not be listed"));
}

#[tokio::test]
async fn test_list_all_resources_total_failure() {
    let server = MockGcpServer::start().await;
    server
        .mock_error("GET", MockGcpServer::instances_path("us-central1-a"), 500, "compute down")
        .await;
    server
        .mock_error("GET", MockGcpServer::services_path("us-central1"), 500, "run down")
        .await;

    match resources::list_all_resources(&server.context(), None, None).await {
        OperationResult::Error { error, context, .. } => {
            assert!(error.contains("compute down"));
            assert!(error.contains("run down"));
            assert_eq!(context["project_id"], "test-project");
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resource_summary_counts() {
    let server = populated().await;

    let result = resources::get_resource_summary(&server.context(), None, None).await;
    let summary = result.details().expect("success");
    assert_eq!(summary.zone, "us-central1-a");
    assert_eq!(summary.region, "us-central1");
    assert_eq!(summary.compute_engine.total_instances, 2);
    assert_eq!(summary.compute_engine.running, 1);
    assert_eq!(summary.compute_engine.stopped, 1);
    assert_eq!(summary.cloud_run.total_services, 2);
    assert_eq!(summary.cloud_run.active, 1);
    assert!(chrono::DateTime::parse_from_rfc3339(&summary.timestamp).is_ok());
}

#[tokio::test]
async fn test_search_matches_names_labels_and_tags() {
    let server = populated().await;
    let ctx = server.context();

    let by_label = resources::search_resources(&ctx, "PROD", None, None).await;
    let names: Vec<String> = by_label
        .details()
        .unwrap()
        .matches
        .iter()
        .map(|r| r.name.clone())
        .collect();
    assert_eq!(names, vec!["db".to_string(), "api".to_string()]);

    let by_tag = resources::search_resources(&ctx, "minecraft", None, None).await;
    assert_eq!(by_tag.details().unwrap().count, 1);

    let none = resources::search_resources(&ctx, "nothing-here", None, None).await;
    assert_eq!(none.status(), "success");
    assert_eq!(none.details().unwrap().count, 0);
}

#[tokio::test]
async fn test_search_rejects_empty_query() {
    let server = MockGcpServer::start().await;
    let result = resources::search_resources(&server.context(), "   ", None, None).await;
    assert!(result.is_error());
    assert_eq!(server.request_count().await, 0);
}
