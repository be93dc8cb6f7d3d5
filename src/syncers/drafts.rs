//! Helpers shared by the draft builders of the syncers.

use serde_json::{Map, Value};

use crate::engine::SyncError;

pub(crate) fn as_object(raw: &Value) -> Result<&Map<String, Value>, SyncError> {
    raw.as_object()
        .ok_or_else(|| SyncError::InvalidResource("resource is not a JSON object".to_string()))
}

/// Copies the listed fields that are present and not null.
pub(crate) fn pick(raw: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|field| {
            raw.get(*field)
                .filter(|v| !v.is_null())
                .map(|v| (field.to_string(), v.clone()))
        })
        .collect()
}

/// Inserts `value` under `field` unless it is `None`.
pub(crate) fn insert_opt(draft: &mut Map<String, Value>, field: &str, value: Option<Value>) {
    if let Some(value) = value {
        draft.insert(field.to_string(), value);
    }
}

/// `{"type", "fields"}` of a resource's custom fields.
pub(crate) fn custom_draft(raw: &Map<String, Value>) -> Option<Value> {
    let custom = raw.get("custom")?.as_object()?;
    let mut draft = pick(custom, &["type", "fields"]);
    if let Some(Value::Object(reference)) = draft.get_mut("type") {
        reference.remove("obj");
    }
    Some(Value::Object(draft))
}

/// Maps every object of `items` through `f`; `None` if `items` is not an array.
pub(crate) fn map_items<F>(items: Option<&Value>, f: F) -> Option<Value>
where
    F: Fn(&Map<String, Value>) -> Map<String, Value>,
{
    let items = items?.as_array()?;
    Some(Value::Array(
        items
            .iter()
            .filter_map(Value::as_object)
            .map(|item| Value::Object(f(item)))
            .collect(),
    ))
}

pub(crate) fn asset_drafts(assets: Option<&Value>) -> Option<Value> {
    map_items(assets, |asset| {
        let mut draft = pick(asset, &["key", "sources", "name", "description", "tags"]);
        insert_opt(&mut draft, "custom", custom_draft(asset));
        draft
    })
}

/// Money without the read-only fields of typed money.
pub(crate) fn money_draft(money: &Value) -> Value {
    let Some(money) = money.as_object() else {
        return money.clone();
    };
    let high_precision = money.get("type").and_then(Value::as_str) == Some("highPrecision");
    let fields: &[&str] = if high_precision {
        &["type", "currencyCode", "centAmount", "preciseAmount", "fractionDigits"]
    } else {
        &["currencyCode", "centAmount"]
    };
    Value::Object(pick(money, fields))
}

pub(crate) fn price_drafts(prices: Option<&Value>) -> Option<Value> {
    map_items(prices, |price| {
        let mut draft = pick(
            price,
            &["key", "country", "customerGroup", "channel", "validFrom", "validUntil"],
        );
        insert_opt(&mut draft, "value", price.get("value").map(money_draft));
        insert_opt(
            &mut draft,
            "tiers",
            map_items(price.get("tiers"), |tier| {
                let mut tier_draft = pick(tier, &["minimumQuantity"]);
                insert_opt(&mut tier_draft, "value", tier.get("value").map(money_draft));
                tier_draft
            }),
        );
        insert_opt(&mut draft, "custom", custom_draft(price));
        draft
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pick_skips_null_and_missing() {
        let raw = json!({"key": "a", "description": null, "id": "x"});
        let picked = pick(raw.as_object().unwrap(), &["key", "description", "name"]);
        assert_eq!(Value::Object(picked), json!({"key": "a"}));
    }

    #[test]
    fn test_price_drafts_strip_ids_and_typed_money() {
        let prices = json!([{
            "id": "price-1",
            "value": {"type": "centPrecision", "currencyCode": "EUR", "centAmount": 1299, "fractionDigits": 2},
            "country": "DE",
            "channel": {"typeId": "channel", "id": "ch-1"},
            "discounted": {"value": {"currencyCode": "EUR", "centAmount": 999}}
        }]);
        assert_eq!(
            price_drafts(Some(&prices)).unwrap(),
            json!([{
                "country": "DE",
                "channel": {"typeId": "channel", "id": "ch-1"},
                "value": {"currencyCode": "EUR", "centAmount": 1299}
            }])
        );
    }

    #[test]
    fn test_custom_draft_drops_expansion() {
        let raw = json!({
            "custom": {
                "type": {"typeId": "type", "id": "t-1", "obj": {"key": "t"}},
                "fields": {"color": "red"}
            }
        });
        assert_eq!(
            custom_draft(raw.as_object().unwrap()).unwrap(),
            json!({"type": {"typeId": "type", "id": "t-1"}, "fields": {"color": "red"}})
        );
    }
}
