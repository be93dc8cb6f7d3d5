//! Last-sync timestamps stored as custom objects in the target project.
//!
//! Every sync module of a runner remembers when it last finished, so the
//! next run only fetches source resources modified since then.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{CtpClient, CtpError};
use crate::engine::SyncStatistics;
use crate::resource::ResourceType;

const CONTAINER_PREFIX: &str = "commercetools-project-sync";
const TIMESTAMP_GENERATOR_KEY: &str = "timestampGenerator";

/// Subtracted from the generated timestamp to absorb clock skew between
/// API nodes.
const CLOCK_SKEW_BUFFER_MINUTES: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSyncCustomObject {
    pub last_sync_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub last_sync_duration_in_millis: u64,
    #[serde(default)]
    pub application_version: String,
    #[serde(default)]
    pub last_sync_statistics: SyncStatistics,
}

impl LastSyncCustomObject {
    pub fn new(timestamp: DateTime<Utc>, statistics: SyncStatistics) -> Self {
        Self {
            last_sync_timestamp: timestamp,
            last_sync_duration_in_millis: statistics.processing_time_in_millis,
            application_version: env!("CARGO_PKG_VERSION").to_string(),
            last_sync_statistics: statistics,
        }
    }
}

/// Reads and writes the last-sync custom objects of one runner.
#[derive(Debug, Clone)]
pub struct LastSyncStore {
    target: CtpClient,
    runner_name: String,
}

impl LastSyncStore {
    pub fn new(target: CtpClient, runner_name: impl Into<String>) -> Self {
        Self {
            target,
            runner_name: runner_name.into(),
        }
    }

    pub fn container(&self, resource_type: ResourceType) -> String {
        format!(
            "{}.{}.{}",
            CONTAINER_PREFIX,
            self.runner_name,
            resource_type.sync_module_name()
        )
    }

    fn generator_container(&self) -> String {
        format!(
            "{}.{}.{}",
            CONTAINER_PREFIX, self.runner_name, TIMESTAMP_GENERATOR_KEY
        )
    }

    /// The last sync of `resource_type` from `source_project_key`, if any.
    pub async fn read(
        &self,
        resource_type: ResourceType,
        source_project_key: &str,
    ) -> Result<Option<LastSyncCustomObject>, CtpError> {
        let container = self.container(resource_type);
        let Some(object) = self
            .target
            .get_custom_object(&container, source_project_key)
            .await?
        else {
            return Ok(None);
        };

        match serde_json::from_value(object.get("value").cloned().unwrap_or(Value::Null)) {
            Ok(last_sync) => Ok(Some(last_sync)),
            Err(e) => {
                debug!(%container, "Ignoring unreadable last sync object: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn write(
        &self,
        resource_type: ResourceType,
        source_project_key: &str,
        last_sync: &LastSyncCustomObject,
    ) -> Result<(), CtpError> {
        let value = serde_json::to_value(last_sync).map_err(|e| {
            CtpError::Configuration(format!("failed to serialize last sync: {}", e))
        })?;
        self.target
            .upsert_custom_object(&self.container(resource_type), source_project_key, &value)
            .await?;
        Ok(())
    }

    /// The platform's current time minus the clock skew buffer.
    ///
    /// Writes a throwaway custom object and reads its `lastModifiedAt`, so
    /// the timestamp comes from the same clock as the resources' own.
    pub async fn current_timestamp(&self) -> Result<DateTime<Utc>, CtpError> {
        let value = json!(uuid::Uuid::new_v4().to_string());
        let object = self
            .target
            .upsert_custom_object(&self.generator_container(), TIMESTAMP_GENERATOR_KEY, &value)
            .await?;

        let modified = object
            .get("lastModifiedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .ok_or_else(|| {
                CtpError::Configuration(
                    "timestamp generator object has no lastModifiedAt".to_string(),
                )
            })?;

        Ok(modified.with_timezone(&Utc) - Duration::minutes(CLOCK_SKEW_BUFFER_MINUTES))
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Where-clause selecting resources modified in `[last, now]`.
pub fn delta_predicate(last: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    format!(
        "lastModifiedAt >= \"{}\" and lastModifiedAt <= \"{}\"",
        format_timestamp(last),
        format_timestamp(now)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_delta_predicate() {
        let last = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 15).unwrap();
        assert_eq!(
            delta_predicate(&last, &now),
            "lastModifiedAt >= \"2024-05-01T10:00:00.000Z\" and lastModifiedAt <= \"2024-05-02T08:30:15.000Z\""
        );
    }

    #[test]
    fn test_last_sync_object_shape() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stats = SyncStatistics {
            processed: 4,
            created: 1,
            updated: 2,
            failed: 1,
            processing_time_in_millis: 1500,
        };
        let value = serde_json::to_value(LastSyncCustomObject::new(timestamp, stats)).unwrap();

        assert_eq!(value["lastSyncTimestamp"], "2024-01-01T00:00:00Z");
        assert_eq!(value["lastSyncDurationInMillis"], 1500);
        assert_eq!(value["lastSyncStatistics"]["processed"], 4);
        assert!(value["applicationVersion"].is_string());
    }

    #[test]
    fn test_reads_minimal_value() {
        let value = json!({"lastSyncTimestamp": "2024-01-01T00:00:00.000Z"});
        let parsed: LastSyncCustomObject = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.last_sync_statistics, SyncStatistics::new());
    }
}
