use serde_json::{json, Map, Value};

use super::drafts::{as_object, custom_draft, insert_opt, pick};
use super::Syncer;
use crate::engine::SyncError;
use crate::resource::ResourceType;

const FIELDS: &[&str] = &[
    "key",
    "email",
    "password",
    "customerNumber",
    "externalId",
    "firstName",
    "lastName",
    "middleName",
    "title",
    "salutation",
    "dateOfBirth",
    "companyName",
    "vatId",
    "locale",
    "customerGroup",
    "isEmailVerified",
    "stores",
    "authenticationMode",
];

/// Customers. Address ids are project specific, so default and typed
/// addresses are expressed as indices into `addresses` as customer drafts
/// expect.
#[derive(Debug, Default)]
pub struct CustomerSyncer;

impl Syncer for CustomerSyncer {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Customer
    }

    fn to_draft(&self, raw: &Value) -> Result<Value, SyncError> {
        let raw = as_object(raw)?;
        let mut draft = pick(raw, FIELDS);

        let addresses: Vec<&Map<String, Value>> = raw
            .get("addresses")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default();
        let index_of = |id: &str| {
            addresses
                .iter()
                .position(|a| a.get("id").and_then(Value::as_str) == Some(id))
        };

        if !addresses.is_empty() {
            let drafts: Vec<Value> = addresses
                .iter()
                .map(|address| {
                    let mut address = (*address).clone();
                    address.remove("id");
                    Value::Object(address)
                })
                .collect();
            draft.insert("addresses".to_string(), Value::Array(drafts));
        }

        for (id_field, draft_field) in [
            ("defaultShippingAddressId", "defaultShippingAddress"),
            ("defaultBillingAddressId", "defaultBillingAddress"),
        ] {
            let index = raw.get(id_field).and_then(Value::as_str).and_then(index_of);
            insert_opt(&mut draft, draft_field, index.map(|i| json!(i)));
        }

        for (ids_field, draft_field) in [
            ("shippingAddressIds", "shippingAddresses"),
            ("billingAddressIds", "billingAddresses"),
        ] {
            let indices: Vec<Value> = raw
                .get(ids_field)
                .and_then(Value::as_array)
                .map(|ids| {
                    ids.iter()
                        .filter_map(Value::as_str)
                        .filter_map(index_of)
                        .map(|i| json!(i))
                        .collect()
                })
                .unwrap_or_default();
            if !indices.is_empty() {
                draft.insert(draft_field.to_string(), Value::Array(indices));
            }
        }

        insert_opt(&mut draft, "custom", custom_draft(raw));
        Ok(Value::Object(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_ids_become_indices() {
        let raw = json!({
            "id": "cu-1",
            "key": "jane",
            "email": "jane@example.com",
            "password": "****hash",
            "addresses": [
                {"id": "a-1", "key": "home", "country": "DE"},
                {"id": "a-2", "key": "work", "country": "DE"}
            ],
            "defaultShippingAddressId": "a-2",
            "shippingAddressIds": ["a-1", "a-2"],
            "billingAddressIds": [],
            "customerGroup": {"typeId": "customer-group", "id": "cg-1"},
            "stores": [{"typeId": "store", "key": "eu"}]
        });

        let draft = CustomerSyncer.to_draft(&raw).unwrap();
        assert_eq!(
            draft["addresses"],
            json!([{"key": "home", "country": "DE"}, {"key": "work", "country": "DE"}])
        );
        assert_eq!(draft["defaultShippingAddress"], json!(1));
        assert_eq!(draft["shippingAddresses"], json!([0, 1]));
        assert!(draft.get("billingAddresses").is_none());
        assert!(draft.get("defaultBillingAddress").is_none());
        assert_eq!(draft["password"], json!("****hash"));
    }
}
