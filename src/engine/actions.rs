//! Update actions that turn an existing target resource into its draft.
//!
//! Both sides are compared in draft form with references pointing at target
//! ids. Null, empty arrays and empty objects count as absent.

use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use super::error::SyncError;
use crate::resource::ResourceType;

/// Actions to apply plus warnings about changes that were left out.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ActionPlan {
    pub actions: Vec<Value>,
    pub warnings: Vec<String>,
}

impl ActionPlan {
    fn push(&mut self, action: &str, params: Vec<(&str, Value)>) {
        let mut body = Map::new();
        body.insert("action".to_string(), json!(action));
        for (name, value) in params {
            body.insert(name.to_string(), value);
        }
        self.actions.push(Value::Object(body));
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// `change*` action: the value is mandatory, so a removal in the draft
    /// can only be reported.
    fn change(&mut self, draft: &Value, target: &Value, field: &str, action: &str) {
        self.change_as(draft, target, field, action, field);
    }

    fn change_as(&mut self, draft: &Value, target: &Value, field: &str, action: &str, param: &str) {
        if same(draft.get(field), target.get(field)) {
            return;
        }
        match present(draft.get(field)) {
            Some(value) => self.push(action, vec![(param, value.clone())]),
            None => self.warn(format!("'{}' cannot be removed", field)),
        }
    }

    /// `change*` action for fields with an API default.
    fn change_or_default(
        &mut self,
        draft: &Value,
        target: &Value,
        field: &str,
        action: &str,
        default: Value,
    ) {
        let wanted = present(draft.get(field)).cloned().unwrap_or_else(|| default.clone());
        let actual = present(target.get(field)).cloned().unwrap_or(default);
        if wanted != actual {
            self.push(action, vec![(field, wanted)]);
        }
    }

    /// `set*` action: an absent value unsets the field.
    fn set(&mut self, draft: &Value, target: &Value, field: &str, action: &str) {
        self.set_as(draft, target, field, action, field);
    }

    fn set_as(&mut self, draft: &Value, target: &Value, field: &str, action: &str, param: &str) {
        if same(draft.get(field), target.get(field)) {
            return;
        }
        let params = present(draft.get(field))
            .map(|value| vec![(param, value.clone())])
            .unwrap_or_default();
        self.push(action, params);
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    })
}

fn same(a: Option<&Value>, b: Option<&Value>) -> bool {
    present(a) == present(b)
}

fn objects(value: Option<&Value>) -> Vec<&Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

fn text<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    map.get(field).and_then(Value::as_str)
}

fn find<'a>(
    items: &[&'a Map<String, Value>],
    field: &str,
    value: &str,
) -> Option<&'a Map<String, Value>> {
    items.iter().copied().find(|item| text(item, field) == Some(value))
}

/// Computes the update actions for `resource_type`.
///
/// `target_raw` is the existing resource as returned by the API; some
/// actions address nested items by their target ids.
pub fn build(
    resource_type: ResourceType,
    draft: &Value,
    target: &Value,
    target_raw: &Value,
) -> Result<ActionPlan, SyncError> {
    let mut plan = ActionPlan::default();
    match resource_type {
        ResourceType::Category => category(&mut plan, draft, target),
        ResourceType::Product => product(&mut plan, draft, target, target_raw)?,
        ResourceType::ProductType => product_type(&mut plan, draft, target),
        ResourceType::Type => type_definition(&mut plan, draft, target),
        ResourceType::State => state(&mut plan, draft, target),
        ResourceType::TaxCategory => tax_category(&mut plan, draft, target, target_raw),
        ResourceType::Customer => customer(&mut plan, draft, target),
        ResourceType::ShoppingList => shopping_list(&mut plan, draft, target, target_raw),
        ResourceType::InventoryEntry => inventory_entry(&mut plan, draft, target),
        ResourceType::CartDiscount => cart_discount(&mut plan, draft, target),
        // Custom objects are overwritten as a whole by the engine.
        ResourceType::CustomObject => {}
    }
    Ok(plan)
}

fn custom(plan: &mut ActionPlan, draft: &Value, target: &Value) {
    let wanted = present(draft.get("custom"));
    let actual = present(target.get("custom"));

    match (wanted, actual) {
        (None, None) => {}
        (None, Some(_)) => plan.push("setCustomType", vec![]),
        (Some(wanted), actual) => {
            let same_type = actual
                .map(|actual| same(wanted.get("type"), actual.get("type")))
                .unwrap_or(false);
            if !same_type {
                let mut params = vec![];
                if let Some(t) = wanted.get("type") {
                    params.push(("type", t.clone()));
                }
                if let Some(fields) = present(wanted.get("fields")) {
                    params.push(("fields", fields.clone()));
                }
                plan.push("setCustomType", params);
                return;
            }

            let empty = Map::new();
            let wanted_fields = wanted.get("fields").and_then(Value::as_object).unwrap_or(&empty);
            let actual_fields = actual
                .and_then(|a| a.get("fields"))
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            let names: BTreeSet<&String> =
                wanted_fields.keys().chain(actual_fields.keys()).collect();
            for name in names {
                let value = wanted_fields.get(name.as_str());
                if !same(value, actual_fields.get(name.as_str())) {
                    let mut params = vec![("name", json!(name))];
                    if let Some(value) = present(value) {
                        params.push(("value", value.clone()));
                    }
                    plan.push("setCustomField", params);
                }
            }
        }
    }
}

fn category(plan: &mut ActionPlan, draft: &Value, target: &Value) {
    plan.change(draft, target, "name", "changeName");
    plan.change(draft, target, "slug", "changeSlug");
    plan.set(draft, target, "description", "setDescription");
    plan.change(draft, target, "parent", "changeParent");
    plan.change(draft, target, "orderHint", "changeOrderHint");
    plan.set(draft, target, "externalId", "setExternalId");
    plan.set(draft, target, "metaTitle", "setMetaTitle");
    plan.set(draft, target, "metaDescription", "setMetaDescription");
    plan.set(draft, target, "metaKeywords", "setMetaKeywords");
    custom(plan, draft, target);
    if !same(draft.get("assets"), target.get("assets")) {
        plan.warn("asset changes are not synced");
    }
}

fn product(
    plan: &mut ActionPlan,
    draft: &Value,
    target: &Value,
    target_raw: &Value,
) -> Result<(), SyncError> {
    if !same(draft.get("productType"), target.get("productType")) {
        return Err(SyncError::Unsupported(
            "the product type of an existing product cannot be changed".to_string(),
        ));
    }

    plan.change(draft, target, "name", "changeName");
    plan.change(draft, target, "slug", "changeSlug");
    plan.set(draft, target, "description", "setDescription");
    plan.set(draft, target, "metaTitle", "setMetaTitle");
    plan.set(draft, target, "metaDescription", "setMetaDescription");
    plan.set(draft, target, "metaKeywords", "setMetaKeywords");
    if !same(draft.get("searchKeywords"), target.get("searchKeywords")) {
        let keywords = present(draft.get("searchKeywords")).cloned().unwrap_or(json!({}));
        plan.push("setSearchKeywords", vec![("searchKeywords", keywords)]);
    }
    plan.set(draft, target, "taxCategory", "setTaxCategory");
    if !same(draft.get("state"), target.get("state")) {
        if let Some(state) = present(draft.get("state")) {
            plan.push(
                "transitionState",
                vec![("state", state.clone()), ("force", json!(true))],
            );
        }
    }

    let wanted: Vec<&Value> = draft
        .get("categories")
        .and_then(Value::as_array)
        .map(|c| c.iter().collect())
        .unwrap_or_default();
    let actual: Vec<&Value> = target
        .get("categories")
        .and_then(Value::as_array)
        .map(|c| c.iter().collect())
        .unwrap_or_default();
    for category in wanted.iter().filter(|c| !actual.contains(c)) {
        plan.push("addToCategory", vec![("category", (*category).clone())]);
    }
    for category in actual.iter().filter(|c| !wanted.contains(c)) {
        plan.push("removeFromCategory", vec![("category", (*category).clone())]);
    }

    variants(plan, draft, target);

    let publish = draft.get("publish").and_then(Value::as_bool).unwrap_or(false);
    let published = target.get("publish").and_then(Value::as_bool).unwrap_or(false);
    let staged_changes = target_raw
        .pointer("/masterData/hasStagedChanges")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if publish {
        if !plan.actions.is_empty() || !published || staged_changes {
            plan.push("publish", vec![]);
        }
    } else if published {
        plan.push("unpublish", vec![]);
    }

    Ok(())
}

fn all_variants(product: &Value) -> Vec<&Map<String, Value>> {
    let mut variants: Vec<&Map<String, Value>> = product
        .get("masterVariant")
        .and_then(Value::as_object)
        .into_iter()
        .collect();
    variants.extend(objects(product.get("variants")));
    variants
}

fn variants(plan: &mut ActionPlan, draft: &Value, target: &Value) {
    let wanted = all_variants(draft);
    let actual = all_variants(target);

    if wanted.iter().any(|v| text(v, "sku").is_none()) {
        plan.warn("variants without sku are not synced");
    }

    for variant in wanted.iter().filter(|v| text(v, "sku").is_some()) {
        let Some(sku) = text(variant, "sku") else {
            continue;
        };
        if find(&actual, "sku", sku).is_none() {
            let mut params = vec![];
            for field in ["sku", "key", "prices", "attributes", "images", "assets"] {
                if let Some(value) = present(variant.get(field)) {
                    params.push((field, value.clone()));
                }
            }
            plan.push("addVariant", params);
        }
    }

    let wanted_master = wanted.first().and_then(|v| text(v, "sku"));
    let actual_master = actual.first().and_then(|v| text(v, "sku"));
    if let (Some(wanted_master), Some(actual_master)) = (wanted_master, actual_master) {
        if wanted_master != actual_master {
            plan.push("changeMasterVariant", vec![("sku", json!(wanted_master))]);
        }
    }

    for variant in &actual {
        if let Some(sku) = text(variant, "sku") {
            if find(&wanted, "sku", sku).is_none() {
                plan.push("removeVariant", vec![("sku", json!(sku))]);
            }
        }
    }

    for variant in &wanted {
        let Some(sku) = text(variant, "sku") else {
            continue;
        };
        let Some(existing) = find(&actual, "sku", sku) else {
            continue;
        };

        let wanted_attrs = objects(variant.get("attributes"));
        let actual_attrs = objects(existing.get("attributes"));
        let names: BTreeSet<&str> = wanted_attrs
            .iter()
            .chain(actual_attrs.iter())
            .filter_map(|a| text(a, "name"))
            .collect();
        for name in names {
            let value = find(&wanted_attrs, "name", name).and_then(|a| a.get("value"));
            let current = find(&actual_attrs, "name", name).and_then(|a| a.get("value"));
            if !same(value, current) {
                let mut params = vec![("sku", json!(sku)), ("name", json!(name))];
                if let Some(value) = present(value) {
                    params.push(("value", value.clone()));
                }
                plan.push("setAttribute", params);
            }
        }

        if !same(variant.get("prices"), existing.get("prices")) {
            let prices = present(variant.get("prices")).cloned().unwrap_or(json!([]));
            plan.push("setPrices", vec![("sku", json!(sku)), ("prices", prices)]);
        }

        if !same(variant.get("images"), existing.get("images"))
            || !same(variant.get("assets"), existing.get("assets"))
        {
            plan.warn(format!("image and asset changes of variant '{}' are not synced", sku));
        }
    }
}

fn product_type(plan: &mut ActionPlan, draft: &Value, target: &Value) {
    plan.change(draft, target, "name", "changeName");
    plan.change(draft, target, "description", "changeDescription");

    let wanted = objects(draft.get("attributes"));
    let actual = objects(target.get("attributes"));

    for attribute in &actual {
        if let Some(name) = text(attribute, "name") {
            if find(&wanted, "name", name).is_none() {
                plan.push("removeAttributeDefinition", vec![("name", json!(name))]);
            }
        }
    }

    for attribute in &wanted {
        let Some(name) = text(attribute, "name") else {
            continue;
        };
        let Some(existing) = find(&actual, "name", name) else {
            plan.push(
                "addAttributeDefinition",
                vec![("attribute", Value::Object((*attribute).clone()))],
            );
            continue;
        };

        let attribute = Value::Object((*attribute).clone());
        let existing = Value::Object(existing.clone());
        let name = json!(name);

        if !same(attribute.get("label"), existing.get("label")) {
            if let Some(label) = present(attribute.get("label")) {
                plan.push(
                    "changeLabel",
                    vec![("attributeName", name.clone()), ("label", label.clone())],
                );
            }
        }
        if !same(attribute.get("inputTip"), existing.get("inputTip")) {
            let mut params = vec![("attributeName", name.clone())];
            if let Some(tip) = present(attribute.get("inputTip")) {
                params.push(("inputTip", tip.clone()));
            }
            plan.push("setInputTip", params);
        }
        if !same(attribute.get("isSearchable"), existing.get("isSearchable")) {
            if let Some(searchable) = present(attribute.get("isSearchable")) {
                plan.push(
                    "changeIsSearchable",
                    vec![("attributeName", name.clone()), ("isSearchable", searchable.clone())],
                );
            }
        }
        if !same(attribute.get("inputHint"), existing.get("inputHint")) {
            if let Some(hint) = present(attribute.get("inputHint")) {
                plan.push(
                    "changeInputHint",
                    vec![("attributeName", name.clone()), ("newValue", hint.clone())],
                );
            }
        }
        if !same(attribute.get("type"), existing.get("type")) {
            plan.warn(format!(
                "the type of attribute {} cannot be changed",
                name
            ));
        }
        if !same(
            attribute.get("attributeConstraint"),
            existing.get("attributeConstraint"),
        ) {
            plan.warn(format!(
                "the constraint of attribute {} is not synced",
                name
            ));
        }
    }
}

fn type_definition(plan: &mut ActionPlan, draft: &Value, target: &Value) {
    plan.change(draft, target, "name", "changeName");
    plan.set(draft, target, "description", "setDescription");
    if !same(draft.get("resourceTypeIds"), target.get("resourceTypeIds")) {
        plan.warn("resourceTypeIds cannot be changed");
    }

    let wanted = objects(draft.get("fieldDefinitions"));
    let actual = objects(target.get("fieldDefinitions"));

    for field in &actual {
        if let Some(name) = text(field, "name") {
            if find(&wanted, "name", name).is_none() {
                plan.push("removeFieldDefinition", vec![("fieldName", json!(name))]);
            }
        }
    }

    for field in &wanted {
        let Some(name) = text(field, "name") else {
            continue;
        };
        let Some(existing) = find(&actual, "name", name) else {
            plan.push(
                "addFieldDefinition",
                vec![("fieldDefinition", Value::Object((*field).clone()))],
            );
            continue;
        };

        if !same(field.get("label"), existing.get("label")) {
            if let Some(label) = present(field.get("label")) {
                plan.push(
                    "changeLabel",
                    vec![("fieldName", json!(name)), ("label", label.clone())],
                );
            }
        }
        if !same(field.get("type"), existing.get("type"))
            || !same(field.get("required"), existing.get("required"))
        {
            plan.warn(format!("type and required flag of field '{}' cannot be changed", name));
        }
    }
}

fn state(plan: &mut ActionPlan, draft: &Value, target: &Value) {
    plan.set(draft, target, "name", "setName");
    plan.set(draft, target, "description", "setDescription");
    plan.change(draft, target, "type", "changeType");
    plan.change_or_default(draft, target, "initial", "changeInitial", json!(false));
    plan.set(draft, target, "transitions", "setTransitions");
    if !same(draft.get("roles"), target.get("roles")) {
        let roles = present(draft.get("roles")).cloned().unwrap_or(json!([]));
        plan.push("setRoles", vec![("roles", roles)]);
    }
}

fn tax_category(plan: &mut ActionPlan, draft: &Value, target: &Value, target_raw: &Value) {
    plan.change(draft, target, "name", "changeName");
    plan.set(draft, target, "description", "setDescription");

    if !same(draft.get("rates"), target.get("rates")) {
        for rate in objects(target_raw.get("rates")) {
            if let Some(id) = text(rate, "id") {
                plan.push("removeTaxRate", vec![("taxRateId", json!(id))]);
            }
        }
        for rate in objects(draft.get("rates")) {
            plan.push("addTaxRate", vec![("taxRate", Value::Object(rate.clone()))]);
        }
    }
}

fn address_key_at(customer: &Value, field: &str) -> Option<String> {
    let index = customer.get(field)?.as_u64()? as usize;
    let addresses = objects(customer.get("addresses"));
    addresses
        .get(index)
        .and_then(|a| text(a, "key"))
        .map(str::to_string)
}

/// Keys of the addresses at the indices listed in `field`.
fn address_keys_in(customer: &Value, field: &str) -> BTreeSet<String> {
    let addresses = objects(customer.get("addresses"));
    customer
        .get(field)
        .and_then(Value::as_array)
        .map(|indices| {
            indices
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|i| addresses.get(i as usize))
                .filter_map(|a| text(a, "key"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn customer(plan: &mut ActionPlan, draft: &Value, target: &Value) {
    plan.change(draft, target, "email", "changeEmail");
    for (field, action) in [
        ("firstName", "setFirstName"),
        ("lastName", "setLastName"),
        ("middleName", "setMiddleName"),
        ("title", "setTitle"),
        ("salutation", "setSalutation"),
        ("dateOfBirth", "setDateOfBirth"),
        ("companyName", "setCompanyName"),
        ("vatId", "setVatId"),
        ("customerNumber", "setCustomerNumber"),
        ("externalId", "setExternalId"),
        ("locale", "setLocale"),
        ("customerGroup", "setCustomerGroup"),
    ] {
        plan.set(draft, target, field, action);
    }
    if !same(draft.get("stores"), target.get("stores")) {
        let stores = present(draft.get("stores")).cloned().unwrap_or(json!([]));
        plan.push("setStores", vec![("stores", stores)]);
    }

    let wanted = objects(draft.get("addresses"));
    let actual = objects(target.get("addresses"));
    if wanted.iter().chain(actual.iter()).any(|a| text(a, "key").is_none()) {
        plan.warn("addresses without key are not synced");
    }

    for address in &wanted {
        let Some(key) = text(address, "key") else {
            continue;
        };
        match find(&actual, "key", key) {
            None => plan.push("addAddress", vec![("address", Value::Object((*address).clone()))]),
            Some(existing) if existing != *address => plan.push(
                "changeAddress",
                vec![
                    ("addressKey", json!(key)),
                    ("address", Value::Object((*address).clone())),
                ],
            ),
            Some(_) => {}
        }
    }

    for (field, action) in [
        ("defaultShippingAddress", "setDefaultShippingAddress"),
        ("defaultBillingAddress", "setDefaultBillingAddress"),
    ] {
        let wanted_key = address_key_at(draft, field);
        if wanted_key != address_key_at(target, field) {
            let params = wanted_key
                .map(|key| vec![("addressKey", json!(key))])
                .unwrap_or_default();
            plan.push(action, params);
        }
    }

    // Removing an address also drops it from these lists.
    for (field, add, remove) in [
        ("shippingAddresses", "addShippingAddressId", "removeShippingAddressId"),
        ("billingAddresses", "addBillingAddressId", "removeBillingAddressId"),
    ] {
        let wanted_keys = address_keys_in(draft, field);
        let actual_keys = address_keys_in(target, field);
        for key in wanted_keys.difference(&actual_keys) {
            plan.push(add, vec![("addressKey", json!(key))]);
        }
        for key in actual_keys.difference(&wanted_keys) {
            if find(&wanted, "key", key).is_some() {
                plan.push(remove, vec![("addressKey", json!(key))]);
            }
        }
    }

    for address in &actual {
        if let Some(key) = text(address, "key") {
            if find(&wanted, "key", key).is_none() {
                plan.push("removeAddress", vec![("addressKey", json!(key))]);
            }
        }
    }

    custom(plan, draft, target);
}

fn without_added_at(items: Option<&Value>) -> Vec<Map<String, Value>> {
    objects(items)
        .into_iter()
        .map(|item| {
            let mut item = item.clone();
            item.remove("addedAt");
            item
        })
        .collect()
}

fn shopping_list(plan: &mut ActionPlan, draft: &Value, target: &Value, target_raw: &Value) {
    plan.change(draft, target, "name", "changeName");
    plan.set(draft, target, "slug", "setSlug");
    plan.set(draft, target, "description", "setDescription");
    plan.set(draft, target, "customer", "setCustomer");
    plan.set(draft, target, "anonymousId", "setAnonymousId");
    plan.set(
        draft,
        target,
        "deleteDaysAfterLastModification",
        "setDeleteDaysAfterLastModification",
    );

    if without_added_at(draft.get("lineItems")) != without_added_at(target.get("lineItems")) {
        for item in objects(target_raw.get("lineItems")) {
            if let Some(id) = text(item, "id") {
                plan.push("removeLineItem", vec![("lineItemId", json!(id))]);
            }
        }
        for item in objects(draft.get("lineItems")) {
            let params = item.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
            plan.push("addLineItem", params);
        }
    }

    if without_added_at(draft.get("textLineItems")) != without_added_at(target.get("textLineItems"))
    {
        for item in objects(target_raw.get("textLineItems")) {
            if let Some(id) = text(item, "id") {
                plan.push("removeTextLineItem", vec![("textLineItemId", json!(id))]);
            }
        }
        for item in objects(draft.get("textLineItems")) {
            let params = item.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
            plan.push("addTextLineItem", params);
        }
    }

    custom(plan, draft, target);
}

fn inventory_entry(plan: &mut ActionPlan, draft: &Value, target: &Value) {
    plan.change_as(draft, target, "quantityOnStock", "changeQuantity", "quantity");
    plan.set(draft, target, "restockableInDays", "setRestockableInDays");
    plan.set(draft, target, "expectedDelivery", "setExpectedDelivery");
    plan.set(draft, target, "supplyChannel", "setSupplyChannel");
    custom(plan, draft, target);
}

fn cart_discount(plan: &mut ActionPlan, draft: &Value, target: &Value) {
    plan.change(draft, target, "name", "changeName");
    plan.set(draft, target, "description", "setDescription");
    plan.change(draft, target, "cartPredicate", "changeCartPredicate");
    plan.change(draft, target, "value", "changeValue");
    plan.change(draft, target, "target", "changeTarget");
    plan.change(draft, target, "sortOrder", "changeSortOrder");
    plan.change_or_default(draft, target, "isActive", "changeIsActive", json!(true));
    plan.change_or_default(
        draft,
        target,
        "requiresDiscountCode",
        "changeRequiresDiscountCode",
        json!(false),
    );
    plan.change_or_default(
        draft,
        target,
        "stackingMode",
        "changeStackingMode",
        json!("Stacking"),
    );
    plan.set(draft, target, "validFrom", "setValidFrom");
    plan.set(draft, target, "validUntil", "setValidUntil");
    if !same(draft.get("stores"), target.get("stores")) {
        let stores = present(draft.get("stores")).cloned().unwrap_or(json!([]));
        plan.push("setStores", vec![("stores", stores)]);
    }
    custom(plan, draft, target);
}
