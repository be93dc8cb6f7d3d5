//! Shared helpers for the integration tests.

#![allow(dead_code)]

use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ctp_project_sync::config::ProjectCredentials;
use ctp_project_sync::{CtpClient, RetryPolicy, SyncOptions};
use ctp_project_sync::ResourceType;

pub const SOURCE_KEY: &str = "src";
pub const TARGET_KEY: &str = "tgt";

pub fn credentials(server: &MockServer, project_key: &str) -> ProjectCredentials {
    ProjectCredentials {
        project_key: project_key.to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        auth_url: server.uri(),
        api_url: server.uri(),
        scopes: vec![format!("manage_project:{}", project_key)],
    }
}

pub fn fast_retries() -> RetryPolicy {
    RetryPolicy::new(2)
        .with_initial_backoff(Duration::from_millis(1))
        .without_jitter()
}

/// Mounts the token endpoint and returns a client for `project_key`.
pub async fn client(server: &MockServer, project_key: &str) -> CtpClient {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "token_type": "Bearer",
            "expires_in": 172800,
            "scope": format!("manage_project:{}", project_key)
        })))
        .mount(server)
        .await;

    CtpClient::new(&credentials(server, project_key), fast_retries()).unwrap()
}

pub fn page(results: serde_json::Value) -> ResponseTemplate {
    let count = results.as_array().map(|r| r.len()).unwrap_or(0);
    ResponseTemplate::new(200).set_body_json(json!({
        "limit": 20,
        "offset": 0,
        "count": count,
        "results": results
    }))
}

pub fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "statusCode": 404,
        "message": "The Resource with the given key was not found.",
        "errors": [{"code": "ResourceNotFound", "message": "not found"}]
    }))
}

/// Options that record error messages instead of only logging them.
pub fn recording_options(
    resource_type: ResourceType,
    dry_run: bool,
) -> (Arc<SyncOptions>, Arc<Mutex<Vec<String>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let options = SyncOptions::with_logging(resource_type, dry_run).with_error_callback(Arc::new(
        move |_, key, err| {
            sink.lock()
                .unwrap()
                .push(format!("{}: {}", key.unwrap_or("<none>"), err));
        },
    ));
    (Arc::new(options), errors)
}
