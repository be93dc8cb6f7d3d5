//! The `sync` command: copies resources from the source to the target project.

use clap::Args;

use crate::client::{CtpClient, RetryPolicy};
use crate::config::{Config, ProjectSide};
use crate::runner::{parse_selection, RunError, RunOptions, SyncReport, SyncRunner};
use crate::syncers::ProductQuery;

/// Sync resources from the source project to the target project
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Resource types to sync: types, productTypes, states, taxCategories,
    /// customObjects, customers, categories, inventoryEntries, cartDiscounts,
    /// products, shoppingLists or all
    #[arg(long, short, required = true, num_args = 1..)]
    sync: Vec<String>,

    /// Name that namespaces the stored last-sync timestamps
    #[arg(long, short, default_value = crate::runner::DEFAULT_RUNNER_NAME)]
    runner_name: String,

    /// Sync everything, ignoring the last-sync timestamps
    #[arg(long, short)]
    full: bool,

    /// Custom product query as JSON, e.g. '{"limit": 100, "where": "masterData(published = true)"}'
    #[arg(long)]
    product_query: Option<String>,

    /// Compute changes without writing to the target project
    #[arg(long)]
    dry_run: bool,
}

impl SyncCommand {
    pub async fn run(&self, config: &Config) -> Result<(), RunError> {
        let selection = parse_selection(&self.sync)?;
        let product_query = self
            .product_query
            .as_deref()
            .map(ProductQuery::parse)
            .transpose()
            .map_err(|e| RunError::InvalidArguments(format!("invalid --product-query: {}", e)))?;

        let retry = RetryPolicy::new(config.max_retries.value);
        let source = CtpClient::new(&config.source.credentials(ProjectSide::Source)?, retry.clone())?;
        let target = CtpClient::new(&config.target.credentials(ProjectSide::Target)?, retry)?;

        if self.dry_run {
            println!("Dry run: no changes will be written to '{}'.", target.project_key());
        }
        println!(
            "Syncing from '{}' to '{}'...",
            source.project_key(),
            target.project_key()
        );
        println!();

        let runner = SyncRunner::new(
            source,
            target,
            RunOptions {
                runner_name: self.runner_name.clone(),
                full: self.full,
                dry_run: self.dry_run,
                page_size: config.page_size.value,
                concurrency: config.concurrency.value,
                product_query,
            },
        );
        let reports = runner.run(&selection).await?;

        for report in &reports {
            println!("  {}", summary_line(report));
        }
        println!();

        let aborted: Vec<String> = reports
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.resource_type.to_string())
            .collect();
        if !aborted.is_empty() {
            return Err(RunError::Aborted(aborted));
        }

        println!("Sync complete.");
        Ok(())
    }
}

fn summary_line(report: &SyncReport) -> String {
    match &report.error {
        Some(e) => format!("✗ {} aborted: {}", report.resource_type, e),
        None => format!(
            "✓ {}",
            report.statistics.report_message(report.resource_type)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyncStatistics;
    use crate::resource::ResourceType;

    #[test]
    fn test_summary_line() {
        let ok = SyncReport {
            resource_type: ResourceType::State,
            statistics: SyncStatistics {
                processed: 2,
                created: 1,
                updated: 0,
                failed: 1,
                processing_time_in_millis: 3,
            },
            error: None,
        };
        assert_eq!(
            summary_line(&ok),
            "✓ Summary: 2 states were processed in total (1 created, 0 updated and 1 failed to sync)."
        );

        let aborted = SyncReport {
            error: Some("connection refused".to_string()),
            ..ok
        };
        assert_eq!(summary_line(&aborted), "✗ states aborted: connection refused");
    }
}
