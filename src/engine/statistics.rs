//! Counters collected while syncing one resource type.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resource::ResourceType;

/// Outcome counters of a sync. Batches are merged into one total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatistics {
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    pub failed: u64,
    #[serde(default)]
    pub processing_time_in_millis: u64,
}

impl SyncStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drafts that matched an existing resource and needed no change.
    pub fn up_to_date(&self) -> u64 {
        self.processed
            .saturating_sub(self.created + self.updated + self.failed)
    }

    pub fn record_failed(&mut self, count: u64) {
        self.processed += count;
        self.failed += count;
    }

    pub fn merge(&mut self, other: &SyncStatistics) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.failed += other.failed;
    }

    pub fn set_processing_time(&mut self, elapsed: Duration) {
        self.processing_time_in_millis = elapsed.as_millis() as u64;
    }

    /// One-line human readable summary.
    pub fn report_message(&self, resource: ResourceType) -> String {
        format!(
            "Summary: {} {} were processed in total ({} created, {} updated and {} failed to sync).",
            self.processed,
            resource.plural(),
            self.created,
            self.updated,
            self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_up_to_date() {
        let mut total = SyncStatistics::new();
        total.merge(&SyncStatistics {
            processed: 5,
            created: 2,
            updated: 1,
            failed: 0,
            processing_time_in_millis: 0,
        });
        total.record_failed(2);

        assert_eq!(total.processed, 7);
        assert_eq!(total.failed, 2);
        assert_eq!(total.up_to_date(), 2);
    }

    #[test]
    fn test_report_message() {
        let stats = SyncStatistics {
            processed: 3,
            created: 1,
            updated: 1,
            failed: 1,
            processing_time_in_millis: 12,
        };
        assert_eq!(
            stats.report_message(ResourceType::TaxCategory),
            "Summary: 3 tax categories were processed in total (1 created, 1 updated and 1 failed to sync)."
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(SyncStatistics::new()).unwrap();
        assert!(json.get("processingTimeInMillis").is_some());
    }
}
