use serde_json::Value;

use super::drafts::{as_object, insert_opt, map_items, pick};
use super::Syncer;
use crate::engine::SyncError;
use crate::resource::ResourceType;

#[derive(Debug, Default)]
pub struct TaxCategorySyncer;

impl Syncer for TaxCategorySyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::TaxCategory
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        let mut draft = pick(raw, &["key", "name", "description"]);
        insert_opt(
            &mut draft,
            "rates",
            map_items(raw.get("rates"), |rate| {
                pick(
                    rate,
                    &["key", "name", "amount", "includedInPrice", "country", "state", "subRates"],
                )
            }),
        );
        Ok(Value::Object(draft))
    }
}
