use serde_json::Value;

use super::drafts::{as_object, pick};
use super::Syncer;
use crate::engine::SyncError;
use crate::resource::ResourceType;

/// Custom field type definitions.
#[derive(Debug, Default)]
pub struct TypeSyncer;

impl Syncer for TypeSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Type
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        Ok(Value::Object(pick(
            raw,
            &["key", "name", "description", "resourceTypeIds", "fieldDefinitions"],
        )))
    }
}
