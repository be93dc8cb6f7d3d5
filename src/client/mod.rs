//! HTTP client for one commerce platform project.
//!
//! Wraps `reqwest` with OAuth2 client-credentials authentication, retries
//! with exponential backoff for throttled requests, and the handful of
//! endpoints the syncers need: paged queries, reads by id, creates, updates
//! and custom-object upserts.

mod auth;
mod error;
mod query;
mod retry;

pub use auth::TokenProvider;
pub use error::CtpError;
pub use query::{in_predicate, quote, PagedQueryResult, QueryParams};
pub use retry::{parse_retry_after, RetryPolicy};

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::ProjectCredentials;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    project_key: String,
    api_url: String,
    tokens: TokenProvider,
    retry: RetryPolicy,
}

/// API client bound to one project. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CtpClient {
    inner: Arc<Inner>,
}

impl CtpClient {
    pub fn new(credentials: &ProjectCredentials, retry: RetryPolicy) -> Result<Self, CtpError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("ctp-project-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CtpError::Configuration(e.to_string()))?;

        let tokens = TokenProvider::new(http.clone(), credentials);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                project_key: credentials.project_key.clone(),
                api_url: credentials.api_url.clone(),
                tokens,
                retry,
            }),
        })
    }

    pub fn project_key(&self) -> &str {
        &self.inner.project_key
    }

    /// Queries one page of `endpoint`.
    pub async fn query(
        &self,
        endpoint: &str,
        params: &QueryParams,
    ) -> Result<PagedQueryResult, CtpError> {
        let url = self.url(endpoint);
        let body = self.send(Method::GET, &url, &params.to_pairs(), None).await?;
        serde_json::from_value(body).map_err(|source| CtpError::Decode { url, source })
    }

    /// Reads a resource by id; `None` if it does not exist.
    pub async fn get_by_id(
        &self,
        endpoint: &str,
        id: &str,
        expand: &[String],
    ) -> Result<Option<Value>, CtpError> {
        let url = self.url(&format!("{}/{}", endpoint, urlencoding::encode(id)));
        let query: Vec<(String, String)> = expand
            .iter()
            .map(|e| ("expand".to_string(), e.clone()))
            .collect();
        match self.send(Method::GET, &url, &query, None).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create(&self, endpoint: &str, draft: &Value) -> Result<Value, CtpError> {
        let url = self.url(endpoint);
        self.send(Method::POST, &url, &[], Some(draft)).await
    }

    pub async fn update(
        &self,
        endpoint: &str,
        id: &str,
        version: u64,
        actions: &[Value],
    ) -> Result<Value, CtpError> {
        let url = self.url(&format!("{}/{}", endpoint, urlencoding::encode(id)));
        let body = json!({ "version": version, "actions": actions });
        self.send(Method::POST, &url, &[], Some(&body)).await
    }

    /// Reads a custom object by container and key.
    pub async fn get_custom_object(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Value>, CtpError> {
        let url = self.url(&format!(
            "custom-objects/{}/{}",
            urlencoding::encode(container),
            urlencoding::encode(key)
        ));
        match self.send(Method::GET, &url, &[], None).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Creates or overwrites a custom object.
    pub async fn upsert_custom_object(
        &self,
        container: &str,
        key: &str,
        value: &Value,
    ) -> Result<Value, CtpError> {
        let draft = json!({ "container": container, "key": key, "value": value });
        self.create("custom-objects", &draft).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.inner.api_url, self.inner.project_key, path)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, CtpError> {
        let retry = &self.inner.retry;
        let mut attempt = 0;
        let mut token_refreshed = false;

        loop {
            let token = self.inner.tokens.token().await?;
            let mut request = self
                .inner
                .http
                .request(method.clone(), url)
                .bearer_auth(token)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            trace!(%method, %url, attempt, "Sending request");

            let response = match request.send().await {
                Ok(response) => response,
                Err(source) => {
                    if attempt < retry.max_retries && (source.is_timeout() || source.is_connect()) {
                        attempt += 1;
                        let delay = retry.backoff(attempt);
                        warn!(%url, attempt, ?delay, "Request failed, retrying: {}", source);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(CtpError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
            };

            let status = response.status();
            if status.is_success() {
                let text = response.text().await.map_err(|source| CtpError::Transport {
                    url: url.to_string(),
                    source,
                })?;
                debug!(%method, %url, status = status.as_u16(), "Request succeeded");
                return serde_json::from_str(&text).map_err(|source| CtpError::Decode {
                    url: url.to_string(),
                    source,
                });
            }

            if status == StatusCode::UNAUTHORIZED && !token_refreshed {
                token_refreshed = true;
                self.inner.tokens.invalidate().await;
                continue;
            }

            if retry.should_retry(status.as_u16()) && attempt < retry.max_retries {
                attempt += 1;
                let delay = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after)
                    .unwrap_or_else(|| retry.backoff(attempt));
                warn!(%url, status = status.as_u16(), attempt, ?delay, "Retrying request");
                tokio::time::sleep(delay).await;
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            return Err(CtpError::from_response(&method, url, status.as_u16(), &text));
        }
    }
}
