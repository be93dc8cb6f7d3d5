//! API client error types.

use serde::Deserialize;
use thiserror::Error;

/// Errors returned by the commerce platform API client.
#[derive(Debug, Error)]
pub enum CtpError {
    /// Request could not be sent or the connection broke
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Token endpoint rejected the client credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// API answered with a non-success status
    #[error("{method} {url} returned {status}: {message}")]
    Status {
        method: String,
        url: String,
        status: u16,
        message: String,
    },

    /// Response body was not the expected JSON
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Client could not be constructed
    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

impl CtpError {
    /// HTTP status of the failed response, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CtpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The resource was modified between read and update.
    pub fn is_concurrent_modification(&self) -> bool {
        self.status() == Some(409)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub(crate) fn from_response(method: &reqwest::Method, url: &str, status: u16, body: &str) -> Self {
        CtpError::Status {
            method: method.to_string(),
            url: url.to_string(),
            status,
            message: error_message(body),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// Extracts a readable message from an API error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let details: Vec<String> = parsed
                .errors
                .iter()
                .filter_map(|e| match (&e.code, &e.message) {
                    (Some(code), Some(msg)) => Some(format!("[{}] {}", code, msg)),
                    (None, Some(msg)) => Some(msg.clone()),
                    (Some(code), None) => Some(format!("[{}]", code)),
                    (None, None) => None,
                })
                .collect();
            if !details.is_empty() {
                details.join("; ")
            } else {
                parsed.message.unwrap_or_else(|| truncate(body))
            }
        }
        Err(_) => truncate(body),
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 300;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}
