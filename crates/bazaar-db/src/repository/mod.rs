//! # Repository Module
//!
//! Database repository implementations for Bazaar.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  CartService / OrderService (bazaar-engine)                            │
//! │       │                                                                 │
//! │       │  db.orders().save(&mut order)                                  │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── UPDATE orders ... WHERE id = ? AND version = ?                    │
//! │  └── INSERT INTO order_ledger (new entries only)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Aggregates cross this boundary as bazaar-core types. Rows are         │
//! │  private FromRow records converted at the edge.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Items, categories, snapshots for pricing
//! - [`CartRepository`](cart::CartRepository) - One cart per owner, versioned
//! - [`OrderRepository`](order::OrderRepository) - Orders and their insert-only ledger
//! - [`SettingsRepository`](settings::SettingsRepository) - Global commission rate

pub mod cart;
pub mod catalog;
pub mod order;
pub mod settings;

// =============================================================================
// Shared Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use bazaar_core::catalog::{
        CatalogItem, Category, FoodDetails, ItemDetails, ItemKind, ProductDetails, Variant,
    };
    use bazaar_core::{Money, Rate};
    use chrono::{DateTime, TimeZone, Utc};

    use crate::{Database, DbConfig};

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn food_category() -> Category {
        Category {
            id: "mains".into(),
            name: "Mains".into(),
            kind: ItemKind::Food,
            parent_id: None,
            tax_rate: Rate::from_percent(5),
            inherit_parent_tax: false,
        }
    }

    pub fn apparel_category() -> Category {
        Category {
            id: "apparel".into(),
            name: "Apparel".into(),
            kind: ItemKind::Product,
            parent_id: None,
            tax_rate: Rate::from_percent(12),
            inherit_parent_tax: false,
        }
    }

    /// Child of `apparel` that defers to the parent's rate.
    pub fn tees_category() -> Category {
        Category {
            id: "tees".into(),
            name: "Tees".into(),
            kind: ItemKind::Product,
            parent_id: Some("apparel".into()),
            tax_rate: Rate::zero(),
            inherit_parent_tax: true,
        }
    }

    pub fn dal() -> CatalogItem {
        CatalogItem {
            id: "dal".into(),
            seller_id: "kitchen".into(),
            name: "Dal".into(),
            details: ItemDetails::Food(FoodDetails {
                price: Money::from_major(10),
                stock: 10,
                delivery_charge: Money::from_major(1),
                category_id: "mains".into(),
            }),
        }
    }

    pub fn tee() -> CatalogItem {
        CatalogItem {
            id: "tee".into(),
            seller_id: "kitchen".into(),
            name: "Tee".into(),
            details: ItemDetails::Product(ProductDetails {
                variants: vec![Variant {
                    id: "tee-m".into(),
                    size: Some("M".into()),
                    color: Some("black".into()),
                    price: Money::from_major(15),
                    stock: 3,
                }],
                delivery_charge: Money::from_major(2),
                category_id: "tees".into(),
            }),
        }
    }

    /// A database holding the categories and items above.
    pub async fn seeded_db() -> Database {
        let db = test_db().await;
        let catalog = db.catalog();
        catalog.insert_category(&food_category(), now()).await.unwrap();
        catalog.insert_category(&apparel_category(), now()).await.unwrap();
        catalog.insert_category(&tees_category(), now()).await.unwrap();
        catalog.upsert_item(&dal(), now()).await.unwrap();
        catalog.upsert_item(&tee(), now()).await.unwrap();
        db
    }
}
