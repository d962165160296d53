//! # Catalog Reference Types
//!
//! Read-only view of the catalog the pricing engine depends on: items, their
//! kind-specific details, product variants and tax-bearing categories.
//!
//! ## Item Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CatalogItem.details                             │
//! │                                                                         │
//! │   Room                   Food                    Product                │
//! │   ──────────────────     ──────────────────      ────────────────────   │
//! │   nightly_price          price                   variants[]             │
//! │   stock (rooms)          stock (portions)          size, color,         │
//! │   category_id            delivery_charge           price, stock         │
//! │                          category_id             delivery_charge        │
//! │                                                  category_id            │
//! │                                                                         │
//! │   no delivery            delivery address        delivery address      │
//! │                          required                required              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core never loads catalog data itself. Callers hand it a
//! [`CatalogLookup`]; the database layer builds a [`CatalogSnapshot`] holding
//! only the items a cart or order touches.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Rate;

// =============================================================================
// Item Kind
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Room,
    Food,
    Product,
}

impl ItemKind {
    /// Food and products are shipped; rooms are not.
    #[inline]
    pub const fn requires_delivery(&self) -> bool {
        matches!(self, ItemKind::Food | ItemKind::Product)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Room => "room",
            ItemKind::Food => "food",
            ItemKind::Product => "product",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Item Details
// =============================================================================

/// A purchasable configuration of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Variant {
    pub id: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Money,
    pub stock: i64,
}

impl Variant {
    /// True when the size/colour selection names this variant.
    pub fn matches_selection(&self, size: Option<&str>, color: Option<&str>) -> bool {
        self.size.as_deref() == size && self.color.as_deref() == color
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomDetails {
    /// Price of one room for one night.
    pub nightly_price: Money,
    /// Rooms of this type available.
    pub stock: i64,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FoodDetails {
    pub price: Money,
    pub stock: i64,
    /// Flat charge added once per cart line.
    pub delivery_charge: Money,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductDetails {
    pub variants: Vec<Variant>,
    /// Flat charge added once per cart line.
    pub delivery_charge: Money,
    pub category_id: String,
}

impl ProductDetails {
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    pub fn variant_by_selection(&self, size: Option<&str>, color: Option<&str>) -> Option<&Variant> {
        self.variants.iter().find(|v| v.matches_selection(size, color))
    }
}

/// Kind-specific catalog data. The tag doubles as the item kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum ItemDetails {
    Room(RoomDetails),
    Food(FoodDetails),
    Product(ProductDetails),
}

impl ItemDetails {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemDetails::Room(_) => ItemKind::Room,
            ItemDetails::Food(_) => ItemKind::Food,
            ItemDetails::Product(_) => ItemKind::Product,
        }
    }

    pub fn category_id(&self) -> &str {
        match self {
            ItemDetails::Room(d) => &d.category_id,
            ItemDetails::Food(d) => &d.category_id,
            ItemDetails::Product(d) => &d.category_id,
        }
    }
}

// =============================================================================
// Catalog Item
// =============================================================================

/// A sellable listing owned by one seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CatalogItem {
    pub id: String,
    /// The partner who sells this item and decides its orders.
    pub seller_id: String,
    pub name: String,
    pub details: ItemDetails,
}

impl CatalogItem {
    #[inline]
    pub fn kind(&self) -> ItemKind {
        self.details.kind()
    }
}

// =============================================================================
// Category
// =============================================================================

/// A tax-bearing category. Sub-categories may defer to their parent's rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub parent_id: Option<String>,
    pub tax_rate: Rate,
    /// Use the parent's rate instead of `tax_rate` (one level only).
    pub inherit_parent_tax: bool,
}

// =============================================================================
// Lookup Trait
// =============================================================================

/// Read access to catalog data.
///
/// Implementations return `None` for unknown ids; the provided methods turn
/// that into `CoreError::NotFound` so nothing ever prices at a silent zero.
pub trait CatalogLookup {
    fn item(&self, id: &str) -> Option<&CatalogItem>;

    fn category(&self, id: &str) -> Option<&Category>;

    fn require_item(&self, id: &str) -> CoreResult<&CatalogItem> {
        self.item(id).ok_or_else(|| CoreError::not_found("item", id))
    }

    fn require_category(&self, id: &str) -> CoreResult<&Category> {
        self.category(id)
            .ok_or_else(|| CoreError::not_found("category", id))
    }

    /// Resolves the rate that applies to items of `category_id`.
    ///
    /// A category flagged `inherit_parent_tax` uses its parent's own rate.
    /// The parent must exist; a dangling parent is a `NotFound`.
    fn effective_tax_rate(&self, category_id: &str) -> CoreResult<Rate> {
        let category = self.require_category(category_id)?;
        match (&category.parent_id, category.inherit_parent_tax) {
            (Some(parent_id), true) => Ok(self.require_category(parent_id)?.tax_rate),
            _ => Ok(category.tax_rate),
        }
    }
}

/// In-memory catalog, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    items: HashMap<String, CatalogItem>,
    categories: HashMap<String, Category>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&mut self, item: CatalogItem) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn insert_category(&mut self, category: Category) {
        self.categories.insert(category.id.clone(), category);
    }

    pub fn with_item(mut self, item: CatalogItem) -> Self {
        self.insert_item(item);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.insert_category(category);
        self
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl CatalogLookup for CatalogSnapshot {
    fn item(&self, id: &str) -> Option<&CatalogItem> {
        self.items.get(id)
    }

    fn category(&self, id: &str) -> Option<&Category> {
        self.categories.get(id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: &str, parent: Option<&str>, bps: u32, inherit: bool) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_string(),
            kind: ItemKind::Food,
            parent_id: parent.map(str::to_string),
            tax_rate: Rate::from_bps(bps),
            inherit_parent_tax: inherit,
        }
    }

    #[test]
    fn test_effective_tax_rate_own() {
        let catalog = CatalogSnapshot::new().with_category(category("bakery", None, 500, false));
        assert_eq!(catalog.effective_tax_rate("bakery").unwrap(), Rate::from_bps(500));
    }

    #[test]
    fn test_effective_tax_rate_inherits_one_level() {
        let catalog = CatalogSnapshot::new()
            .with_category(category("food", None, 500, false))
            .with_category(category("desserts", Some("food"), 1800, true))
            .with_category(category("cakes", Some("desserts"), 0, true));

        assert_eq!(catalog.effective_tax_rate("desserts").unwrap(), Rate::from_bps(500));
        // Parent's own rate, not the parent's inherited rate
        assert_eq!(catalog.effective_tax_rate("cakes").unwrap(), Rate::from_bps(1800));
    }

    #[test]
    fn test_effective_tax_rate_missing_category() {
        let catalog = CatalogSnapshot::new().with_category(category("orphan", Some("gone"), 0, true));

        assert!(matches!(
            catalog.effective_tax_rate("nope"),
            Err(CoreError::NotFound { entity: "category", .. })
        ));
        assert!(matches!(
            catalog.effective_tax_rate("orphan"),
            Err(CoreError::NotFound { entity: "category", .. })
        ));
    }

    #[test]
    fn test_variant_selection() {
        let details = ProductDetails {
            variants: vec![
                Variant {
                    id: "v-s-red".into(),
                    size: Some("S".into()),
                    color: Some("red".into()),
                    price: Money::from_major(15),
                    stock: 4,
                },
                Variant {
                    id: "v-m-red".into(),
                    size: Some("M".into()),
                    color: Some("red".into()),
                    price: Money::from_major(17),
                    stock: 0,
                },
            ],
            delivery_charge: Money::zero(),
            category_id: "apparel".into(),
        };

        assert_eq!(details.variant("v-m-red").map(|v| v.price), Some(Money::from_major(17)));
        assert_eq!(
            details.variant_by_selection(Some("S"), Some("red")).map(|v| v.id.as_str()),
            Some("v-s-red")
        );
        assert!(details.variant_by_selection(Some("L"), Some("red")).is_none());
    }

    #[test]
    fn test_item_details_tagged_by_kind() {
        let details = ItemDetails::Food(FoodDetails {
            price: Money::from_major(10),
            stock: 5,
            delivery_charge: Money::from_major(1),
            category_id: "mains".into(),
        });
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["kind"], "food");
        assert_eq!(details.kind(), ItemKind::Food);
        assert!(details.kind().requires_delivery());
        assert!(!ItemKind::Room.requires_delivery());
    }
}
