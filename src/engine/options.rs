//! Sync options and the error/warning callbacks every sync reports through.

use std::sync::Arc;
use tracing::{error, warn};

use super::error::SyncError;
use crate::resource::ResourceType;

/// Called for every draft that failed to sync, with its matching key if known.
pub type ErrorCallback = Arc<dyn Fn(ResourceType, Option<&str>, &SyncError) + Send + Sync>;

/// Called for changes that were skipped or only partially applied.
pub type WarningCallback = Arc<dyn Fn(ResourceType, Option<&str>, &str) + Send + Sync>;

/// Options for syncing one resource type.
#[derive(Clone)]
pub struct SyncOptions {
    pub resource_type: ResourceType,
    /// Log planned writes instead of executing them
    pub dry_run: bool,
    error_callback: ErrorCallback,
    warning_callback: WarningCallback,
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("resource_type", &self.resource_type)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl SyncOptions {
    /// Options whose callbacks log through `tracing`.
    pub fn with_logging(resource_type: ResourceType, dry_run: bool) -> Self {
        Self {
            resource_type,
            dry_run,
            error_callback: Arc::new(log_error),
            warning_callback: Arc::new(log_warning),
        }
    }

    #[must_use]
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.error_callback = callback;
        self
    }

    #[must_use]
    pub fn with_warning_callback(mut self, callback: WarningCallback) -> Self {
        self.warning_callback = callback;
        self
    }

    pub fn report_error(&self, key: Option<&str>, err: &SyncError) {
        (self.error_callback)(self.resource_type, key, err);
    }

    pub fn report_warning(&self, key: Option<&str>, message: &str) {
        (self.warning_callback)(self.resource_type, key, message);
    }
}

fn log_error(resource: ResourceType, key: Option<&str>, err: &SyncError) {
    error!(
        resource = %resource,
        key = key.unwrap_or("<none>"),
        "Error when trying to sync {}: {}",
        resource.plural(),
        err
    );
}

fn log_warning(resource: ResourceType, key: Option<&str>, message: &str) {
    warn!(
        resource = %resource,
        key = key.unwrap_or("<none>"),
        "Warning when trying to sync {}: {}",
        resource.plural(),
        message
    );
}
