use serde_json::Value;

use super::drafts::{as_object, pick};
use super::Syncer;
use crate::engine::SyncError;
use crate::resource::ResourceType;

#[derive(Debug, Default)]
pub struct StateSyncer;

impl Syncer for StateSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::State
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        Ok(Value::Object(pick(
            raw,
            &["key", "type", "name", "description", "initial", "roles", "transitions"],
        )))
    }
}
