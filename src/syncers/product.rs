use serde::Deserialize;
use serde_json::{Map, Value};

use super::drafts::{as_object, asset_drafts, insert_opt, pick, price_drafts};
use super::Syncer;
use crate::client::QueryParams;
use crate::engine::SyncError;
use crate::resource::ResourceType;

const STAGED_FIELDS: &[&str] = &[
    "name",
    "slug",
    "description",
    "categories",
    "metaTitle",
    "metaDescription",
    "metaKeywords",
    "searchKeywords",
];

/// Custom product query given on the command line, e.g.
/// `{"limit": 100, "where": "masterData(published = true)"}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductQuery {
    pub limit: Option<u32>,
    #[serde(rename = "where")]
    pub predicate: Option<String>,
}

impl ProductQuery {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Products, built from the staged projection. The draft publishes the
/// product if the source's current projection is published.
#[derive(Debug, Default)]
pub struct ProductSyncer {
    custom_query: Option<ProductQuery>,
}

impl ProductSyncer {
    pub fn new(custom_query: Option<ProductQuery>) -> Self {
        Self { custom_query }
    }
}

impl Syncer for ProductSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Product
    }

    fn query(&self) -> QueryParams {
        let mut query = QueryParams::new();
        if let Some(custom) = &self.custom_query {
            if let Some(limit) = custom.limit {
                query = query.with_limit(limit);
            }
            if let Some(predicate) = &custom.predicate {
                query = query.with_predicate(predicate.clone());
            }
        }
        query
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        let master_data = raw
            .get("masterData")
            .and_then(Value::as_object)
            .ok_or_else(|| SyncError::InvalidResource("product has no masterData".to_string()))?;
        let staged = master_data
            .get("staged")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                SyncError::InvalidResource("product has no staged projection".to_string())
            })?;

        let mut draft = pick(raw, &["key", "productType", "taxCategory", "state", "priceMode"]);
        draft.extend(pick(staged, STAGED_FIELDS));
        insert_opt(
            &mut draft,
            "masterVariant",
            staged
                .get("masterVariant")
                .and_then(Value::as_object)
                .map(variant_draft),
        );

        let variants: Vec<Value> = staged
            .get("variants")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).map(variant_draft).collect())
            .unwrap_or_default();
        if !variants.is_empty() {
            draft.insert("variants".to_string(), Value::Array(variants));
        }

        let published = master_data
            .get("published")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        draft.insert("publish".to_string(), Value::Bool(published));

        Ok(Value::Object(draft))
    }
}

fn variant_draft(variant: &Map<String, Value>) -> Value {
    let mut draft = pick(variant, &["sku", "key", "attributes", "images"]);
    insert_opt(&mut draft, "prices", price_drafts(variant.get("prices")));
    insert_opt(&mut draft, "assets", asset_drafts(variant.get("assets")));
    Value::Object(draft)
}
