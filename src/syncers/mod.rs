//! Per-resource syncers and the paging loop they share.
//!
//! A syncer knows three things about its resource type: how to query the
//! source, which resources to skip, and how to turn a raw resource into a
//! draft. Everything else (paging, reference replacement, handing drafts to
//! the engine, statistics) is common and lives in [`run_sync`].

pub mod cart_discount;
pub mod category;
pub mod custom_object;
pub mod customer;
mod drafts;
pub mod inventory;
pub mod product;
pub mod product_type;
pub mod shopping_list;
pub mod state;
pub mod tax_category;
pub mod type_definition;

pub use product::ProductQuery;

use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::client::{CtpClient, CtpError, QueryParams};
use crate::engine::{SyncEngine, SyncError, SyncOptions, SyncStatistics};
use crate::reference::ReferenceResolver;
use crate::resource::ResourceType;

/// Adapter between the raw resources of one type and the sync engine.
pub trait Syncer: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    /// Base query for source (and existing target) resources.
    fn query(&self) -> QueryParams {
        QueryParams::new()
    }

    /// Whether a source resource takes part in the sync at all.
    fn accepts(&self, _raw: &Value) -> bool {
        true
    }

    /// Whether drafts contain references to translate.
    fn resolves_references(&self) -> bool {
        true
    }

    /// Builds the draft of a raw resource; references are left as they are.
    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError>;
}

/// The syncer for `resource_type`.
pub fn syncer_for(
    resource_type: ResourceType,
    product_query: Option<&ProductQuery>,
) -> Arc<dyn Syncer> {
    match resource_type {
        ResourceType::Type => Arc::new(type_definition::TypeSyncer),
        ResourceType::ProductType => Arc::new(product_type::ProductTypeSyncer),
        ResourceType::State => Arc::new(state::StateSyncer),
        ResourceType::TaxCategory => Arc::new(tax_category::TaxCategorySyncer),
        ResourceType::CustomObject => Arc::new(custom_object::CustomObjectSyncer),
        ResourceType::Customer => Arc::new(customer::CustomerSyncer),
        ResourceType::Category => Arc::new(category::CategorySyncer),
        ResourceType::InventoryEntry => Arc::new(inventory::InventoryEntrySyncer),
        ResourceType::CartDiscount => Arc::new(cart_discount::CartDiscountSyncer),
        ResourceType::Product => Arc::new(product::ProductSyncer::new(product_query.cloned())),
        ResourceType::ShoppingList => Arc::new(shopping_list::ShoppingListSyncer),
    }
}

/// Everything needed to sync one resource type.
#[derive(Clone)]
pub struct SyncJob {
    pub syncer: Arc<dyn Syncer>,
    pub source: CtpClient,
    pub resolver: Arc<ReferenceResolver>,
    pub engine: Arc<dyn SyncEngine>,
    pub options: Arc<SyncOptions>,
    pub page_size: u32,
    /// Pages transformed and synced at the same time
    pub concurrency: usize,
    /// Extra predicates on the source query, e.g. the delta window
    pub predicates: Vec<String>,
}

/// Pages through the source and syncs every page.
///
/// Pages are fetched one after the other (the id cursor needs the previous
/// page) while up to `concurrency` fetched pages are processed in parallel.
pub async fn run_sync(job: SyncJob) -> Result<SyncStatistics, CtpError> {
    let started = Instant::now();
    let resource_type = job.syncer.resource_type();
    let endpoint = resource_type.endpoint();

    let mut base = job.syncer.query();
    base.predicates.extend(job.predicates.iter().cloned());
    let limit = base.limit.unwrap_or(job.page_size);

    let mut totals = SyncStatistics::new();
    let mut tasks: JoinSet<SyncStatistics> = JoinSet::new();
    let mut last_id: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let query = base.page_after(job.page_size, last_id.as_deref());
        let page = job.source.query(endpoint, &query).await?;
        let fetched = page.results.len();
        last_id = page.last_id().map(str::to_string);
        pages += 1;
        debug!(resource = %resource_type, page = pages, fetched, "Fetched page");

        if fetched > 0 {
            let job = job.clone();
            tasks.spawn(async move {
                let count = page.results.len() as u64;
                AssertUnwindSafe(process_page(&job, page.results))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        // The page's drafts are still accounted for.
                        job.options.report_error(
                            None,
                            &SyncError::Api(format!("batch of {} resources panicked", count)),
                        );
                        let mut stats = SyncStatistics::new();
                        stats.record_failed(count);
                        stats
                    })
            });
        }

        while tasks.len() >= job.concurrency.max(1) {
            join_one(&mut tasks, &mut totals).await;
        }

        if fetched < limit as usize || last_id.is_none() {
            break;
        }
    }

    while !tasks.is_empty() {
        join_one(&mut tasks, &mut totals).await;
    }

    totals.set_processing_time(started.elapsed());
    info!(
        resource = %resource_type,
        statistics = %serde_json::to_string(&totals).unwrap_or_default(),
        "{}",
        totals.report_message(resource_type)
    );
    Ok(totals)
}

async fn join_one(tasks: &mut JoinSet<SyncStatistics>, totals: &mut SyncStatistics) {
    match tasks.join_next().await {
        Some(Ok(stats)) => totals.merge(&stats),
        Some(Err(e)) => error!("Batch task failed: {}", e),
        None => {}
    }
}

async fn process_page(job: &SyncJob, raws: Vec<Value>) -> SyncStatistics {
    let mut stats = SyncStatistics::new();
    let (drafts, failed) = match transform(
        job.syncer.as_ref(),
        &job.resolver,
        &job.options,
        &raws,
    )
    .await
    {
        Ok(result) => result,
        Err(e) => {
            let err = SyncError::from(&e);
            job.options.report_error(None, &err);
            stats.record_failed(raws.len() as u64);
            return stats;
        }
    };

    stats.record_failed(failed);
    stats.merge(&job.engine.sync_batch(drafts).await);
    stats
}

/// Turns one page of raw source resources into upsert-ready drafts.
///
/// Builds each draft and replaces its id references with key references.
/// Returns the drafts and the number of resources that failed; failures are
/// reported through the options' error callback.
pub async fn transform(
    syncer: &dyn Syncer,
    resolver: &ReferenceResolver,
    options: &SyncOptions,
    raws: &[Value],
) -> Result<(Vec<Value>, u64), CtpError> {
    let resource_type = syncer.resource_type();
    let accepted: Vec<&Value> = raws.iter().filter(|raw| syncer.accepts(raw)).collect();
    let mut failed = 0;

    let mut drafts = Vec::with_capacity(accepted.len());
    let mut keys = Vec::with_capacity(accepted.len());
    for raw in &accepted {
        let key = resource_type.matching_key(raw);
        match syncer.to_draft(raw) {
            Ok(draft) => {
                drafts.push(draft);
                keys.push(key);
            }
            Err(err) => {
                options.report_error(key.as_deref(), &err);
                failed += 1;
            }
        }
    }

    if !syncer.resolves_references() {
        return Ok((drafts, failed));
    }

    resolver.seed(resource_type.type_id(), raws).await;

    let mut resolved = Vec::with_capacity(drafts.len());
    for (result, key) in resolver.ids_to_keys(drafts).await?.into_iter().zip(keys) {
        match result {
            Ok(draft) => resolved.push(draft),
            Err(err) => {
                options.report_error(key.as_deref(), &err);
                failed += 1;
            }
        }
    }

    Ok((resolved, failed))
}
