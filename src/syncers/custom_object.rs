use serde_json::Value;

use super::drafts::{as_object, pick};
use super::Syncer;
use crate::engine::SyncError;
use crate::resource::ResourceType;

/// Containers holding this tool's own bookkeeping, and the sync library's.
const EXCLUDED_CONTAINER_PREFIXES: [&str; 2] =
    ["commercetools-project-sync.", "commercetools-sync-java."];

/// Custom objects. Values are arbitrary JSON and are copied untouched.
#[derive(Debug, Default)]
pub struct CustomObjectSyncer;

impl Syncer for CustomObjectSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::CustomObject
    }

    fn accepts(&self, raw: &Value) -> bool {
        let container = raw.get("container").and_then(Value::as_str).unwrap_or_default();
        !EXCLUDED_CONTAINER_PREFIXES
            .iter()
            .any(|prefix| container.starts_with(prefix))
    }

    fn resolves_references(&self) -> bool {
        false
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        Ok(Value::Object(pick(raw, &["container", "key", "value"])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bookkeeping_containers_are_skipped() {
        let syncer = CustomObjectSyncer;
        assert!(!syncer.accepts(&json!({"container": "commercetools-project-sync.runnerName.productSync"})));
        assert!(!syncer.accepts(&json!({"container": "commercetools-sync-java.UnresolvedReferencesService.productDrafts"})));
        assert!(syncer.accepts(&json!({"container": "settings"})));
    }
}
