use serde_json::{Map, Value};

use super::drafts::{as_object, custom_draft, insert_opt, pick};
use super::Syncer;
use crate::client::QueryParams;
use crate::engine::SyncError;
use crate::resource::ResourceType;

const FIELDS: &[&str] = &[
    "key",
    "name",
    "slug",
    "description",
    "customer",
    "anonymousId",
    "deleteDaysAfterLastModification",
    "store",
];

/// Shopping lists. Line items point at product variants by sku, which is
/// only available with the variant expanded.
#[derive(Debug, Default)]
pub struct ShoppingListSyncer;

impl Syncer for ShoppingListSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::ShoppingList
    }

    fn query(&self) -> QueryParams {
        QueryParams::new().with_expand("lineItems[*].variant")
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        let mut draft = pick(raw, FIELDS);

        if let Some(items) = raw.get("lineItems").and_then(Value::as_array) {
            let line_items = items
                .iter()
                .filter_map(Value::as_object)
                .map(line_item_draft)
                .collect::<Result<Vec<_>, _>>()?;
            if !line_items.is_empty() {
                draft.insert("lineItems".to_string(), Value::Array(line_items));
            }
        }

        if let Some(items) = raw.get("textLineItems").and_then(Value::as_array) {
            let text_items: Vec<Value> = items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| {
                    let mut text = pick(item, &["name", "description", "quantity", "addedAt"]);
                    insert_opt(&mut text, "custom", custom_draft(item));
                    Value::Object(text)
                })
                .collect();
            if !text_items.is_empty() {
                draft.insert("textLineItems".to_string(), Value::Array(text_items));
            }
        }

        insert_opt(&mut draft, "custom", custom_draft(raw));
        Ok(Value::Object(draft))
    }
}

fn line_item_draft(item: &Map<String, Value>) -> Result<Value, SyncError> {
    let sku = item
        .get("variant")
        .and_then(|v| v.get("sku"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            SyncError::InvalidResource(format!(
                "line item '{}' has no variant sku",
                item.get("id").and_then(Value::as_str).unwrap_or_default()
            ))
        })?;

    let mut draft = pick(item, &["quantity", "addedAt"]);
    draft.insert("sku".to_string(), Value::String(sku.to_string()));
    insert_opt(&mut draft, "custom", custom_draft(item));
    Ok(Value::Object(draft))
}
