//! Resource types that can be synced and the reference type ids they map to.

use serde_json::Value;

/// A resource type synced from the source to the target project.
///
/// Variants are declared in phase order: resources referenced by others come
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Type,
    ProductType,
    State,
    TaxCategory,
    CustomObject,
    Customer,
    Category,
    InventoryEntry,
    CartDiscount,
    Product,
    ShoppingList,
}

impl ResourceType {
    pub const ALL: [ResourceType; 11] = [
        ResourceType::Type,
        ResourceType::ProductType,
        ResourceType::State,
        ResourceType::TaxCategory,
        ResourceType::CustomObject,
        ResourceType::Customer,
        ResourceType::Category,
        ResourceType::InventoryEntry,
        ResourceType::CartDiscount,
        ResourceType::Product,
        ResourceType::ShoppingList,
    ];

    /// Name accepted by `--sync`.
    pub fn cli_name(self) -> &'static str {
        match self {
            ResourceType::Type => "types",
            ResourceType::ProductType => "productTypes",
            ResourceType::State => "states",
            ResourceType::TaxCategory => "taxCategories",
            ResourceType::CustomObject => "customObjects",
            ResourceType::Customer => "customers",
            ResourceType::Category => "categories",
            ResourceType::InventoryEntry => "inventoryEntries",
            ResourceType::CartDiscount => "cartDiscounts",
            ResourceType::Product => "products",
            ResourceType::ShoppingList => "shoppingLists",
        }
    }

    pub fn from_cli_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rt| rt.cli_name() == name)
    }

    /// Path segment of the HTTP API endpoint.
    pub fn endpoint(self) -> &'static str {
        match self {
            ResourceType::Type => "types",
            ResourceType::ProductType => "product-types",
            ResourceType::State => "states",
            ResourceType::TaxCategory => "tax-categories",
            ResourceType::CustomObject => "custom-objects",
            ResourceType::Customer => "customers",
            ResourceType::Category => "categories",
            ResourceType::InventoryEntry => "inventory",
            ResourceType::CartDiscount => "cart-discounts",
            ResourceType::Product => "products",
            ResourceType::ShoppingList => "shopping-lists",
        }
    }

    /// `typeId` of references pointing at this resource type.
    pub fn type_id(self) -> &'static str {
        match self {
            ResourceType::Type => "type",
            ResourceType::ProductType => "product-type",
            ResourceType::State => "state",
            ResourceType::TaxCategory => "tax-category",
            ResourceType::CustomObject => "key-value-document",
            ResourceType::Customer => "customer",
            ResourceType::Category => "category",
            ResourceType::InventoryEntry => "inventory-entry",
            ResourceType::CartDiscount => "cart-discount",
            ResourceType::Product => "product",
            ResourceType::ShoppingList => "shopping-list",
        }
    }

    /// Module name used to namespace last-sync timestamps.
    pub fn sync_module_name(self) -> &'static str {
        match self {
            ResourceType::Type => "typeSync",
            ResourceType::ProductType => "productTypeSync",
            ResourceType::State => "stateSync",
            ResourceType::TaxCategory => "taxCategorySync",
            ResourceType::CustomObject => "customObjectSync",
            ResourceType::Customer => "customerSync",
            ResourceType::Category => "categorySync",
            ResourceType::InventoryEntry => "inventoryEntrySync",
            ResourceType::CartDiscount => "cartDiscountSync",
            ResourceType::Product => "productSync",
            ResourceType::ShoppingList => "shoppingListSync",
        }
    }

    /// Plural noun used in summaries.
    pub fn plural(self) -> &'static str {
        match self {
            ResourceType::Type => "types",
            ResourceType::ProductType => "product types",
            ResourceType::State => "states",
            ResourceType::TaxCategory => "tax categories",
            ResourceType::CustomObject => "custom objects",
            ResourceType::Customer => "customers",
            ResourceType::Category => "categories",
            ResourceType::InventoryEntry => "inventory entries",
            ResourceType::CartDiscount => "cart discounts",
            ResourceType::Product => "products",
            ResourceType::ShoppingList => "shopping lists",
        }
    }

    /// Sync phase: all types of one phase may run concurrently, phases run in order.
    pub fn phase(self) -> u8 {
        match self {
            ResourceType::Type
            | ResourceType::ProductType
            | ResourceType::State
            | ResourceType::TaxCategory
            | ResourceType::CustomObject
            | ResourceType::Customer => 1,
            ResourceType::Category | ResourceType::InventoryEntry | ResourceType::CartDiscount => 2,
            ResourceType::Product => 3,
            ResourceType::ShoppingList => 4,
        }
    }

    /// Field used to look up existing target resources by the drafts' keys.
    pub fn lookup_field(self) -> &'static str {
        match self {
            ResourceType::InventoryEntry => "sku",
            _ => "key",
        }
    }

    /// Identity used to match a draft against an existing target resource.
    ///
    /// Inventory entries are identified by sku and supply channel, custom
    /// objects by container and key, everything else by key.
    pub fn matching_key(self, resource: &Value) -> Option<String> {
        let text = |field: &str| {
            resource
                .get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match self {
            ResourceType::InventoryEntry => {
                let sku = text("sku")?;
                let channel = resource
                    .get("supplyChannel")
                    .and_then(|c| c.get("id").or_else(|| c.get("key")))
                    .and_then(Value::as_str);
                Some(match channel {
                    Some(channel) => format!("{}|{}", sku, channel),
                    None => sku,
                })
            }
            ResourceType::CustomObject => Some(format!("{}|{}", text("container")?, text("key")?)),
            _ => text("key"),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cli_name())
    }
}

/// Endpoint to look up references of `type_id` between ids and keys.
///
/// Returns `None` for references that are key based already (`store`) or
/// whose targets carry no key.
pub fn resolvable_endpoint(type_id: &str) -> Option<&'static str> {
    match type_id {
        "category" => Some("categories"),
        "product" => Some("products"),
        "product-type" => Some("product-types"),
        "type" => Some("types"),
        "state" => Some("states"),
        "tax-category" => Some("tax-categories"),
        "customer" => Some("customers"),
        "customer-group" => Some("customer-groups"),
        "channel" => Some("channels"),
        "shopping-list" => Some("shopping-lists"),
        "cart-discount" => Some("cart-discounts"),
        "zone" => Some("zones"),
        "shipping-method" => Some("shipping-methods"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_names_round_trip() {
        for rt in ResourceType::ALL {
            assert_eq!(ResourceType::from_cli_name(rt.cli_name()), Some(rt));
        }
        assert_eq!(ResourceType::from_cli_name("orders"), None);
    }

    #[test]
    fn test_phase_order_follows_declaration() {
        let mut sorted = ResourceType::ALL;
        sorted.sort_by_key(|rt| rt.phase());
        assert_eq!(sorted, ResourceType::ALL);
        assert_eq!(ResourceType::Product.phase(), 3);
    }

    #[test]
    fn test_matching_key_inventory_with_channel() {
        let entry = json!({
            "sku": "SKU-1",
            "supplyChannel": {"typeId": "channel", "id": "ch-1"}
        });
        assert_eq!(
            ResourceType::InventoryEntry.matching_key(&entry),
            Some("SKU-1|ch-1".to_string())
        );
        let without = json!({"sku": "SKU-1"});
        assert_eq!(
            ResourceType::InventoryEntry.matching_key(&without),
            Some("SKU-1".to_string())
        );
    }

    #[test]
    fn test_matching_key_requires_non_empty_key() {
        assert_eq!(ResourceType::Category.matching_key(&json!({"key": ""})), None);
        assert_eq!(ResourceType::Category.matching_key(&json!({"name": {}})), None);
        assert_eq!(
            ResourceType::CustomObject.matching_key(&json!({"container": "c", "key": "k"})),
            Some("c|k".to_string())
        );
    }

    #[test]
    fn test_store_references_are_not_resolved() {
        assert_eq!(resolvable_endpoint("store"), None);
        assert_eq!(resolvable_endpoint("key-value-document"), None);
        assert_eq!(resolvable_endpoint("product-type"), Some("product-types"));
    }
}
