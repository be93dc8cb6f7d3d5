//! Runs the selected syncs in dependency order.
//!
//! Resource types are grouped into phases so that everything a resource can
//! reference exists in the target before the resource itself is synced.
//! Syncs within a phase run concurrently.

use chrono::{Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::client::{CtpClient, CtpError};
use crate::config::ConfigError;
use crate::engine::{SyncOptions, SyncStatistics, UpsertEngine};
use crate::last_sync::{delta_predicate, LastSyncCustomObject, LastSyncStore};
use crate::reference::ReferenceResolver;
use crate::resource::ResourceType;
use crate::syncers::{run_sync, syncer_for, ProductQuery, SyncJob};

pub const DEFAULT_RUNNER_NAME: &str = "runnerName";

/// Selection value that stands for every resource type.
pub const ALL_SELECTION: &str = "all";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] CtpError),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("sync aborted for: {}", .0.join(", "))]
    Aborted(Vec<String>),
}

/// Settings shared by all syncs of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub runner_name: String,
    /// Ignore stored last-sync timestamps
    pub full: bool,
    pub dry_run: bool,
    pub page_size: u32,
    pub concurrency: usize,
    pub product_query: Option<ProductQuery>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            runner_name: DEFAULT_RUNNER_NAME.to_string(),
            full: false,
            dry_run: false,
            page_size: crate::config::MAX_PAGE_SIZE,
            concurrency: 1,
            product_query: None,
        }
    }
}

/// Result of syncing one resource type.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub resource_type: ResourceType,
    pub statistics: SyncStatistics,
    /// Why the sync aborted, if it did
    pub error: Option<String>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Parses `--sync` values. `all` selects every resource type.
pub fn parse_selection<S: AsRef<str>>(values: &[S]) -> Result<Vec<ResourceType>, RunError> {
    let mut selection = Vec::new();
    for value in values {
        let value = value.as_ref();
        if value == ALL_SELECTION {
            selection.extend(ResourceType::ALL);
            continue;
        }
        let resource_type = ResourceType::from_cli_name(value).ok_or_else(|| {
            RunError::InvalidArguments(format!(
                "unknown resource type '{}', expected one of: {}, {}",
                value,
                ResourceType::ALL.map(ResourceType::cli_name).join(", "),
                ALL_SELECTION
            ))
        })?;
        selection.push(resource_type);
    }
    if selection.is_empty() {
        return Err(RunError::InvalidArguments(
            "at least one resource type must be selected".to_string(),
        ));
    }
    selection.sort();
    selection.dedup();
    Ok(selection)
}

/// The selection grouped by phase, in phase order.
pub fn phases(selection: &[ResourceType]) -> Vec<Vec<ResourceType>> {
    let mut phases: Vec<Vec<ResourceType>> = Vec::new();
    let mut sorted = selection.to_vec();
    sorted.sort();
    sorted.dedup();
    for resource_type in sorted {
        match phases.last_mut() {
            Some(phase) if phase[0].phase() == resource_type.phase() => phase.push(resource_type),
            _ => phases.push(vec![resource_type]),
        }
    }
    phases
}

pub struct SyncRunner {
    source: CtpClient,
    target: CtpClient,
    options: RunOptions,
    source_resolver: Arc<ReferenceResolver>,
    target_resolver: Arc<ReferenceResolver>,
    last_sync: LastSyncStore,
}

impl SyncRunner {
    pub fn new(source: CtpClient, target: CtpClient, options: RunOptions) -> Self {
        Self {
            source_resolver: Arc::new(ReferenceResolver::new(source.clone())),
            target_resolver: Arc::new(ReferenceResolver::new(target.clone())),
            last_sync: LastSyncStore::new(target.clone(), options.runner_name.clone()),
            source,
            target,
            options,
        }
    }

    /// Syncs `selection`, one phase after the other.
    ///
    /// A sync that aborts is reported in its [`SyncReport`]; the remaining
    /// syncs still run.
    pub async fn run(&self, selection: &[ResourceType]) -> Result<Vec<SyncReport>, RunError> {
        if self.options.product_query.is_some() && !selection.contains(&ResourceType::Product) {
            return Err(RunError::InvalidArguments(
                "--product-query can only be used when syncing products".to_string(),
            ));
        }

        let mut reports = Vec::with_capacity(selection.len());
        for phase in phases(selection) {
            info!(
                resources = %phase.iter().map(|rt| rt.cli_name()).collect::<Vec<_>>().join(", "),
                "Starting phase"
            );
            reports.extend(join_all(phase.into_iter().map(|rt| self.run_one(rt))).await);
        }
        Ok(reports)
    }

    async fn run_one(&self, resource_type: ResourceType) -> SyncReport {
        match self.sync(resource_type).await {
            Ok(statistics) => SyncReport {
                resource_type,
                statistics,
                error: None,
            },
            Err(e) => {
                error!(resource = %resource_type, "Sync aborted: {}", e);
                SyncReport {
                    resource_type,
                    statistics: SyncStatistics::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn sync(&self, resource_type: ResourceType) -> Result<SyncStatistics, CtpError> {
        let source_key = self.source.project_key();

        // Taken before fetching so that changes made during the sync are
        // picked up by the next run.
        let now = if self.options.dry_run {
            Utc::now() - Duration::minutes(2)
        } else {
            self.last_sync.current_timestamp().await?
        };

        let mut predicates = Vec::new();
        if !self.options.full {
            if let Some(last) = self.last_sync.read(resource_type, source_key).await? {
                info!(
                    resource = %resource_type,
                    since = %last.last_sync_timestamp,
                    "Syncing resources modified since the last sync"
                );
                predicates.push(delta_predicate(&last.last_sync_timestamp, &now));
            }
        }

        let syncer = syncer_for(resource_type, self.options.product_query.as_ref());
        let options = Arc::new(SyncOptions::with_logging(resource_type, self.options.dry_run));
        let engine = Arc::new(UpsertEngine::new(
            self.target.clone(),
            self.target_resolver.clone(),
            syncer.clone(),
            options.clone(),
        ));

        let statistics = run_sync(SyncJob {
            syncer,
            source: self.source.clone(),
            resolver: self.source_resolver.clone(),
            engine,
            options,
            page_size: self.options.page_size,
            concurrency: self.options.concurrency,
            predicates,
        })
        .await?;

        if !self.options.dry_run {
            let last_sync = LastSyncCustomObject::new(now, statistics.clone());
            self.last_sync
                .write(resource_type, source_key, &last_sync)
                .await?;
        }

        Ok(statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_all_and_dedup() {
        let all = parse_selection(&["all", "products"]).unwrap();
        assert_eq!(all, ResourceType::ALL.to_vec());

        let some = parse_selection(&["products", "categories", "products"]).unwrap();
        assert_eq!(some, vec![ResourceType::Category, ResourceType::Product]);
    }

    #[test]
    fn test_parse_selection_rejects_unknown() {
        let err = parse_selection(&["orders"]).unwrap_err();
        assert!(matches!(err, RunError::InvalidArguments(_)));
        assert!(err.to_string().contains("orders"));

        let empty: [&str; 0] = [];
        assert!(parse_selection(&empty).is_err());
    }

    #[test]
    fn test_phases_follow_dependency_order() {
        let phases = phases(&ResourceType::ALL);
        assert_eq!(phases.len(), 4);
        assert_eq!(phases[0].len(), 6);
        assert_eq!(
            phases[1],
            vec![
                ResourceType::Category,
                ResourceType::InventoryEntry,
                ResourceType::CartDiscount
            ]
        );
        assert_eq!(phases[2], vec![ResourceType::Product]);
        assert_eq!(phases[3], vec![ResourceType::ShoppingList]);

        let selected = super::phases(&[ResourceType::ShoppingList, ResourceType::Type]);
        assert_eq!(
            selected,
            vec![vec![ResourceType::Type], vec![ResourceType::ShoppingList]]
        );
    }
}
