use serde_json::Value;

use super::drafts::{as_object, custom_draft, insert_opt, pick};
use super::Syncer;
use crate::engine::SyncError;
use crate::resource::ResourceType;

/// Inventory entries, matched by sku and supply channel.
#[derive(Debug, Default)]
pub struct InventoryEntrySyncer;

impl Syncer for InventoryEntrySyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::InventoryEntry
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        let mut draft = pick(
            raw,
            &[
                "sku",
                "key",
                "supplyChannel",
                "quantityOnStock",
                "restockableInDays",
                "expectedDelivery",
            ],
        );
        insert_opt(&mut draft, "custom", custom_draft(raw));
        Ok(Value::Object(draft))
    }
}
