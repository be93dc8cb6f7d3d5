use serde_json::Value;

use super::drafts::{as_object, insert_opt, map_items, pick};
use super::Syncer;
use crate::engine::SyncError;
use crate::resource::ResourceType;

const ATTRIBUTE_FIELDS: &[&str] = &[
    "type",
    "name",
    "label",
    "isRequired",
    "attributeConstraint",
    "inputTip",
    "inputHint",
    "isSearchable",
];

/// Product types. Nested attribute types reference other product types
/// through `typeReference`, which is replaced like any other reference.
#[derive(Debug, Default)]
pub struct ProductTypeSyncer;

impl Syncer for ProductTypeSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::ProductType
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        let mut draft = pick(raw, &["key", "name", "description"]);
        insert_opt(
            &mut draft,
            "attributes",
            map_items(raw.get("attributes"), |attr| pick(attr, ATTRIBUTE_FIELDS)),
        );
        Ok(Value::Object(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_type_reference_is_kept() {
        let raw = json!({
            "id": "pt-1",
            "key": "shirt",
            "name": "Shirt",
            "description": "A shirt",
            "attributes": [{
                "name": "care",
                "label": {"en": "Care"},
                "isRequired": false,
                "type": {"name": "nested", "typeReference": {"typeId": "product-type", "id": "pt-care"}},
                "attributeConstraint": "None",
                "isSearchable": false
            }]
        });

        let draft = ProductTypeSyncer.to_draft(&raw).unwrap();
        assert_eq!(
            draft["attributes"][0]["type"]["typeReference"],
            json!({"typeId": "product-type", "id": "pt-care"})
        );
        assert!(draft.get("id").is_none());
    }
}
