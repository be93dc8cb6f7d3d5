//! Per-draft sync errors reported through the error callback.

use thiserror::Error;

use crate::client::CtpError;

/// Why a single draft could not be synced.
///
/// These never abort a sync; they are reported and counted as failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// The draft has nothing to match it with a target resource
    #[error("draft has no {field}, it cannot be matched against the target project")]
    MissingKey { field: &'static str },

    /// A reference could not be translated between the projects
    #[error("failed to resolve '{type_id}' reference with {attribute} '{value}'")]
    UnresolvedReference {
        type_id: String,
        attribute: &'static str,
        value: String,
    },

    /// The raw resource does not have the expected shape
    #[error("failed to build draft: {0}")]
    InvalidResource(String),

    /// The change cannot be expressed with update actions
    #[error("unsupported change: {0}")]
    Unsupported(String),

    /// A request against the API failed
    #[error("{0}")]
    Api(String),
}

impl From<&CtpError> for SyncError {
    fn from(e: &CtpError) -> Self {
        SyncError::Api(e.to_string())
    }
}

impl From<CtpError> for SyncError {
    fn from(e: CtpError) -> Self {
        SyncError::from(&e)
    }
}
