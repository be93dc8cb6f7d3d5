use serde_json::Value;

use super::drafts::{as_object, custom_draft, insert_opt, money_draft, pick};
use super::Syncer;
use crate::engine::SyncError;
use crate::resource::ResourceType;

const FIELDS: &[&str] = &[
    "key",
    "name",
    "description",
    "cartPredicate",
    "target",
    "sortOrder",
    "stores",
    "isActive",
    "validFrom",
    "validUntil",
    "requiresDiscountCode",
    "stackingMode",
];

#[derive(Debug, Default)]
pub struct CartDiscountSyncer;

impl Syncer for CartDiscountSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::CartDiscount
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        let mut draft = pick(raw, FIELDS);
        insert_opt(&mut draft, "value", raw.get("value").map(value_draft));
        insert_opt(&mut draft, "custom", custom_draft(raw));
        Ok(Value::Object(draft))
    }
}

/// Absolute and fixed values carry typed money; gift line items references.
fn value_draft(value: &Value) -> Value {
    let mut value = value.clone();
    if let Some(money) = value.get_mut("money").and_then(Value::as_array_mut) {
        for amount in money.iter_mut() {
            *amount = money_draft(amount);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absolute_value_money_is_normalized() {
        let raw = json!({
            "id": "cd-1",
            "key": "ten-off",
            "name": {"en": "10 off"},
            "value": {
                "type": "absolute",
                "money": [{"type": "centPrecision", "currencyCode": "EUR", "centAmount": 1000, "fractionDigits": 2}]
            },
            "cartPredicate": "1 = 1",
            "sortOrder": "0.3",
            "isActive": true,
            "requiresDiscountCode": false,
            "stackingMode": "Stacking",
            "references": []
        });

        let draft = CartDiscountSyncer.to_draft(&raw).unwrap();
        assert_eq!(
            draft["value"],
            json!({"type": "absolute", "money": [{"currencyCode": "EUR", "centAmount": 1000}]})
        );
        assert!(draft.get("references").is_none());
    }
}
