//! Sync engine: writes drafts into the target project.
//!
//! The syncers hand over drafts whose references are keys. The engine
//! translates them to target ids, matches each draft against the existing
//! target resource, and creates or updates it.

pub mod actions;
mod error;
mod options;
mod statistics;

pub use error::SyncError;
pub use options::{ErrorCallback, SyncOptions, WarningCallback};
pub use statistics::SyncStatistics;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::{in_predicate, CtpClient, CtpError, QueryParams};
use crate::config::MAX_PAGE_SIZE;
use crate::reference::ReferenceResolver;
use crate::resource::ResourceType;
use crate::syncers::Syncer;

/// Existing resources looked up per request.
const LOOKUP_CHUNK_SIZE: usize = 50;

/// Writes in flight per batch.
const CONCURRENT_WRITES: usize = 8;

/// Accepts drafts and makes the target project match them.
#[async_trait]
pub trait SyncEngine: Send + Sync {
    /// Syncs one batch. Failures are reported through the sync options and
    /// counted; they never abort the batch.
    async fn sync_batch(&self, drafts: Vec<Value>) -> SyncStatistics;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    UpToDate,
    Failed,
}

impl Outcome {
    fn record(self, stats: &mut SyncStatistics) {
        match self {
            Outcome::Created => stats.created += 1,
            Outcome::Updated => stats.updated += 1,
            Outcome::Failed => stats.failed += 1,
            Outcome::UpToDate => {}
        }
    }
}

/// Creates missing resources and updates changed ones through the API.
pub struct UpsertEngine {
    target: CtpClient,
    resolver: Arc<ReferenceResolver>,
    syncer: Arc<dyn Syncer>,
    options: Arc<SyncOptions>,
}

impl UpsertEngine {
    /// `resolver` must be bound to the target project.
    pub fn new(
        target: CtpClient,
        resolver: Arc<ReferenceResolver>,
        syncer: Arc<dyn Syncer>,
        options: Arc<SyncOptions>,
    ) -> Self {
        Self {
            target,
            resolver,
            syncer,
            options,
        }
    }

    fn resource_type(&self) -> ResourceType {
        self.syncer.resource_type()
    }

    fn fail(&self, key: Option<&str>, err: SyncError) -> Outcome {
        self.options.report_error(key, &err);
        Outcome::Failed
    }

    /// Resolves and writes `drafts`. With `defer`, drafts referencing
    /// resources that do not exist yet are returned instead of failing.
    async fn run_pass(
        &self,
        drafts: Vec<Value>,
        stats: &mut SyncStatistics,
        defer: bool,
    ) -> Vec<Value> {
        let resource_type = self.resource_type();
        let mut deferred = Vec::new();

        let resolved = match self.resolver.keys_to_ids(drafts.clone()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                let err = SyncError::from(&e);
                for draft in &drafts {
                    self.fail(resource_type.matching_key(draft).as_deref(), err.clone())
                        .record(stats);
                }
                return deferred;
            }
        };

        let mut ready = Vec::with_capacity(drafts.len());
        for (original, result) in drafts.into_iter().zip(resolved) {
            match result {
                Ok(draft) => ready.push(draft),
                Err(SyncError::UnresolvedReference { .. }) if defer => deferred.push(original),
                Err(err) => self
                    .fail(resource_type.matching_key(&original).as_deref(), err)
                    .record(stats),
            }
        }

        let existing = match self.fetch_existing(&ready).await {
            Ok(existing) => existing,
            Err(e) => {
                let err = SyncError::from(&e);
                for draft in &ready {
                    self.fail(resource_type.matching_key(draft).as_deref(), err.clone())
                        .record(stats);
                }
                return deferred;
            }
        };

        let mut writes = Vec::with_capacity(ready.len());
        for draft in ready {
            let current = resource_type
                .matching_key(&draft)
                .and_then(|key| existing.get(&key).cloned());
            writes.push(self.write(draft, current));
        }
        let outcomes: Vec<Outcome> = stream::iter(writes)
            .buffer_unordered(CONCURRENT_WRITES)
            .collect()
            .await;
        for outcome in outcomes {
            outcome.record(stats);
        }

        deferred
    }

    /// Existing target resources of `drafts` by matching key.
    async fn fetch_existing(&self, drafts: &[Value]) -> Result<HashMap<String, Value>, CtpError> {
        let resource_type = self.resource_type();
        let field = resource_type.lookup_field();
        let values: Vec<&str> = drafts
            .iter()
            .filter_map(|d| d.get(field).and_then(Value::as_str))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        // One lookup value can match many resources (an sku in several
        // supply channels), so every chunk is paged to the end.
        let mut existing = HashMap::new();
        for chunk in values.chunks(LOOKUP_CHUNK_SIZE) {
            let mut base = QueryParams::new().with_predicate(in_predicate(field, chunk));
            base.expand = self.syncer.query().expand;

            let mut last_id: Option<String> = None;
            loop {
                let query = base.page_after(MAX_PAGE_SIZE, last_id.as_deref());
                let page = self.target.query(resource_type.endpoint(), &query).await?;
                let fetched = page.results.len();
                last_id = page.last_id().map(str::to_string);

                self.resolver
                    .seed(resource_type.type_id(), &page.results)
                    .await;
                for raw in page.results {
                    if let Some(key) = resource_type.matching_key(&raw) {
                        existing.insert(key, raw);
                    }
                }

                if fetched < MAX_PAGE_SIZE as usize || last_id.is_none() {
                    break;
                }
            }
        }

        debug!(resource = %resource_type, found = existing.len(), "Fetched existing resources");
        Ok(existing)
    }

    async fn write(&self, draft: Value, current: Option<Value>) -> Outcome {
        match current {
            Some(raw) => self.update(draft, raw).await,
            None => self.create(draft).await,
        }
    }

    async fn create(&self, draft: Value) -> Outcome {
        let resource_type = self.resource_type();
        let key = resource_type.matching_key(&draft);

        if self.options.dry_run {
            info!(resource = %resource_type, key = key.as_deref().unwrap_or_default(), "Dry run: would create");
            return Outcome::Created;
        }

        match self.target.create(resource_type.endpoint(), &draft).await {
            Ok(created) => {
                self.resolver
                    .seed(resource_type.type_id(), std::slice::from_ref(&created))
                    .await;
                Outcome::Created
            }
            Err(e) => self.fail(key.as_deref(), SyncError::from(&e)),
        }
    }

    async fn update(&self, draft: Value, mut raw: Value) -> Outcome {
        let resource_type = self.resource_type();
        let key = resource_type.matching_key(&draft);
        let key = key.as_deref();
        let mut retried = false;

        loop {
            let plan = match self
                .syncer
                .to_draft(&raw)
                .and_then(|current| actions::build(resource_type, &draft, &current, &raw))
            {
                Ok(plan) => plan,
                Err(err) => return self.fail(key, err),
            };
            for warning in &plan.warnings {
                self.options.report_warning(key, warning);
            }
            if plan.actions.is_empty() {
                return Outcome::UpToDate;
            }

            if self.options.dry_run {
                info!(
                    resource = %resource_type,
                    key = key.unwrap_or_default(),
                    actions = %serde_json::to_string(&plan.actions).unwrap_or_default(),
                    "Dry run: would update"
                );
                return Outcome::Updated;
            }

            let (Some(id), Some(version)) = (
                raw.get("id").and_then(Value::as_str),
                raw.get("version").and_then(Value::as_u64),
            ) else {
                return self.fail(
                    key,
                    SyncError::InvalidResource("target resource has no id or version".to_string()),
                );
            };

            match self
                .target
                .update(resource_type.endpoint(), id, version, &plan.actions)
                .await
            {
                Ok(_) => return Outcome::Updated,
                Err(e) if e.is_concurrent_modification() && !retried => {
                    debug!(resource = %resource_type, key, "Concurrent modification, refetching");
                    retried = true;
                    let expand = self.syncer.query().expand;
                    match self.target.get_by_id(resource_type.endpoint(), id, &expand).await {
                        Ok(Some(fresh)) => raw = fresh,
                        Ok(None) => {
                            return self.fail(key, SyncError::Api(format!("{} was deleted", id)))
                        }
                        Err(e) => return self.fail(key, SyncError::from(&e)),
                    }
                }
                Err(e) => return self.fail(key, SyncError::from(&e)),
            }
        }
    }

    async fn sync_custom_object(&self, draft: Value) -> Outcome {
        let key = self.resource_type().matching_key(&draft);
        let (Some(container), Some(object_key)) = (
            draft.get("container").and_then(Value::as_str),
            draft.get("key").and_then(Value::as_str),
        ) else {
            return self.fail(None, SyncError::MissingKey { field: "key" });
        };
        let value = draft.get("value").cloned().unwrap_or(Value::Null);

        let outcome = match self.target.get_custom_object(container, object_key).await {
            Ok(Some(existing)) if existing.get("value") == Some(&value) => {
                return Outcome::UpToDate
            }
            Ok(Some(_)) => Outcome::Updated,
            Ok(None) => Outcome::Created,
            Err(e) => return self.fail(key.as_deref(), SyncError::from(&e)),
        };

        if self.options.dry_run {
            info!(resource = "customObjects", key = key.as_deref().unwrap_or_default(), outcome = ?outcome, "Dry run: would write");
            return outcome;
        }

        match self
            .target
            .upsert_custom_object(container, object_key, &value)
            .await
        {
            Ok(_) => outcome,
            Err(e) => self.fail(key.as_deref(), SyncError::from(&e)),
        }
    }
}

#[async_trait]
impl SyncEngine for UpsertEngine {
    async fn sync_batch(&self, drafts: Vec<Value>) -> SyncStatistics {
        let resource_type = self.resource_type();
        let mut stats = SyncStatistics::new();
        stats.processed = drafts.len() as u64;

        if resource_type == ResourceType::CustomObject {
            let mut writes = Vec::with_capacity(drafts.len());
            for draft in drafts {
                writes.push(self.sync_custom_object(draft));
            }
            let outcomes: Vec<Outcome> = stream::iter(writes)
                .buffer_unordered(CONCURRENT_WRITES)
                .collect()
                .await;
            for outcome in outcomes {
                outcome.record(&mut stats);
            }
            return stats;
        }

        let mut keyed = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if resource_type.matching_key(&draft).is_some() {
                keyed.push(draft);
            } else {
                self.fail(
                    None,
                    SyncError::MissingKey {
                        field: resource_type.lookup_field(),
                    },
                )
                .record(&mut stats);
            }
        }

        // Drafts referencing resources created earlier in this batch are
        // retried as long as each pass resolves some of them. A chain of n
        // levels needs n passes.
        let mut pending = keyed;
        loop {
            let before = pending.len();
            let deferred = self.run_pass(pending, &mut stats, true).await;
            if deferred.is_empty() {
                break;
            }
            if deferred.len() == before {
                self.run_pass(deferred, &mut stats, false).await;
                break;
            }
            debug!(resource = %resource_type, count = deferred.len(), "Retrying drafts with unresolved references");
            pending = deferred;
        }

        stats
    }
}
