//! Runner and last-sync bookkeeping against mock projects.

mod common;

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client, not_found, page, SOURCE_KEY, TARGET_KEY};
use ctp_project_sync::last_sync::LastSyncStore;
use ctp_project_sync::syncers::ProductQuery;
use ctp_project_sync::{ResourceType, RunError, RunOptions, SyncRunner};

const GENERATOR_CONTAINER: &str = "commercetools-project-sync.runnerName.timestampGenerator";
const STATE_CONTAINER: &str = "commercetools-project-sync.runnerName.stateSync";

async fn mount_timestamp_generator(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tgt/custom-objects"))
        .and(body_partial_json(json!({
            "container": GENERATOR_CONTAINER,
            "key": "timestampGenerator"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gen",
            "version": 7,
            "container": GENERATOR_CONTAINER,
            "key": "timestampGenerator",
            "value": "0b0c5d9e-5f3e-4a4e-9b7c-1d2e3f4a5b6c",
            "lastModifiedAt": "2024-05-01T10:02:00.000Z"
        })))
        .mount(server)
        .await;
}

async fn mount_last_sync_write(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tgt/custom-objects"))
        .and(body_partial_json(json!({"container": STATE_CONTAINER, "key": SOURCE_KEY})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "ls"})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_current_timestamp_subtracts_clock_skew_buffer() {
    let server = MockServer::start().await;
    let target = client(&server, TARGET_KEY).await;
    mount_timestamp_generator(&server).await;

    let store = LastSyncStore::new(target, "runnerName");
    let now = store.current_timestamp().await.unwrap();
    assert_eq!(now, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
}

#[tokio::test]
async fn test_delta_sync_queries_since_last_sync() {
    let source_server = MockServer::start().await;
    let target_server = MockServer::start().await;
    let source = client(&source_server, SOURCE_KEY).await;
    let target = client(&target_server, TARGET_KEY).await;

    mount_timestamp_generator(&target_server).await;
    Mock::given(method("GET"))
        .and(path(format!("/tgt/custom-objects/{}/{}", STATE_CONTAINER, SOURCE_KEY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "container": STATE_CONTAINER,
            "key": SOURCE_KEY,
            "value": {
                "lastSyncTimestamp": "2024-05-01T08:00:00.000Z",
                "lastSyncDurationInMillis": 10,
                "applicationVersion": "0.3.0",
                "lastSyncStatistics": {"processed": 1, "created": 1, "updated": 0, "failed": 0}
            }
        })))
        .expect(1)
        .mount(&target_server)
        .await;
    mount_last_sync_write(&target_server).await;

    Mock::given(method("GET"))
        .and(path("/src/states"))
        .and(query_param(
            "where",
            "lastModifiedAt >= \"2024-05-01T08:00:00.000Z\" and lastModifiedAt <= \"2024-05-01T10:00:00.000Z\"",
        ))
        .respond_with(page(json!([])))
        .expect(1)
        .mount(&source_server)
        .await;

    let runner = SyncRunner::new(source, target, RunOptions::default());
    let reports = runner.run(&[ResourceType::State]).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_success(), "{:?}", reports[0].error);
    assert_eq!(reports[0].statistics.processed, 0);
}

#[tokio::test]
async fn test_full_sync_ignores_last_sync() {
    let source_server = MockServer::start().await;
    let target_server = MockServer::start().await;
    let source = client(&source_server, SOURCE_KEY).await;
    let target = client(&target_server, TARGET_KEY).await;

    mount_timestamp_generator(&target_server).await;
    Mock::given(method("GET"))
        .and(path(format!("/tgt/custom-objects/{}/{}", STATE_CONTAINER, SOURCE_KEY)))
        .respond_with(not_found())
        .expect(0)
        .mount(&target_server)
        .await;
    mount_last_sync_write(&target_server).await;

    Mock::given(method("GET"))
        .and(path("/src/states"))
        .and(query_param("sort", "id asc"))
        .respond_with(page(json!([])))
        .expect(1)
        .mount(&source_server)
        .await;

    let options = RunOptions {
        full: true,
        ..RunOptions::default()
    };
    let runner = SyncRunner::new(source, target, options);
    let reports = runner.run(&[ResourceType::State]).await.unwrap();
    assert!(reports[0].is_success());
}

#[tokio::test]
async fn test_aborted_sync_is_reported_and_skips_last_sync() {
    let source_server = MockServer::start().await;
    let target_server = MockServer::start().await;
    let source = client(&source_server, SOURCE_KEY).await;
    let target = client(&target_server, TARGET_KEY).await;

    mount_timestamp_generator(&target_server).await;
    Mock::given(method("GET"))
        .and(path(format!("/tgt/custom-objects/{}/{}", STATE_CONTAINER, SOURCE_KEY)))
        .respond_with(not_found())
        .mount(&target_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tgt/custom-objects"))
        .and(body_partial_json(json!({"container": STATE_CONTAINER})))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&target_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/src/states"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&source_server)
        .await;

    let runner = SyncRunner::new(source, target, RunOptions::default());
    let reports = runner.run(&[ResourceType::State]).await.unwrap();

    assert!(!reports[0].is_success());
    assert!(reports[0].error.as_deref().unwrap_or_default().contains("500"));
}

#[tokio::test]
async fn test_product_query_requires_products() {
    let source_server = MockServer::start().await;
    let target_server = MockServer::start().await;
    let source = client(&source_server, SOURCE_KEY).await;
    let target = client(&target_server, TARGET_KEY).await;

    let options = RunOptions {
        product_query: Some(ProductQuery::parse(r#"{"limit": 10}"#).unwrap()),
        ..RunOptions::default()
    };
    let runner = SyncRunner::new(source, target, options);
    let err = runner.run(&[ResourceType::Category]).await.unwrap_err();
    assert!(matches!(err, RunError::InvalidArguments(_)));
}
