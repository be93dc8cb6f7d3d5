//! Category syncer.

use serde_json::Value;

use super::drafts::{as_object, asset_drafts, custom_draft, insert_opt, pick};
use super::Syncer;
use crate::engine::SyncError;
use crate::resource::ResourceType;

const FIELDS: &[&str] = &[
    "key",
    "name",
    "slug",
    "description",
    "parent",
    "orderHint",
    "externalId",
    "metaTitle",
    "metaDescription",
    "metaKeywords",
];

#[derive(Debug, Default)]
pub struct CategorySyncer;

impl Syncer for CategorySyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Category
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        let mut draft = pick(raw, FIELDS);
        insert_opt(&mut draft, "assets", asset_drafts(raw.get("assets")));
        insert_opt(&mut draft, "custom", custom_draft(raw));
        Ok(Value::Object(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_draft_keeps_draft_fields_only() {
        let raw = json!({
            "id": "c-1",
            "version": 4,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "key": "shoes",
            "name": {"en": "Shoes"},
            "slug": {"en": "shoes"},
            "ancestors": [{"typeId": "category", "id": "c-0"}],
            "parent": {"typeId": "category", "id": "c-0"},
            "orderHint": "0.5",
            "assets": [{"id": "a-1", "key": "img", "name": {"en": "Image"}, "sources": [{"uri": "https://x/1.png"}]}]
        });

        let draft = CategorySyncer.to_draft(&raw).unwrap();
        assert_eq!(
            draft,
            json!({
                "key": "shoes",
                "name": {"en": "Shoes"},
                "slug": {"en": "shoes"},
                "parent": {"typeId": "category", "id": "c-0"},
                "orderHint": "0.5",
                "assets": [{"key": "img", "name": {"en": "Image"}, "sources": [{"uri": "https://x/1.png"}]}]
            })
        );
    }
}
