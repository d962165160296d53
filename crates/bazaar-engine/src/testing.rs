//! Shared fixtures for service tests.

use chrono::Utc;

use bazaar_core::catalog::{
    CatalogItem, Category, FoodDetails, ItemDetails, ItemKind, ProductDetails, RoomDetails, Variant,
};
use bazaar_core::{BankDetails, DeliveryAddress, Money, Rate};
use bazaar_db::{Database, DbConfig};

/// In-memory database with a small catalog and a 10% commission.
///
/// - `dal`: food, seller `kitchen`, 10.00, stock 10, delivery 1.00, tax 5%
/// - `tee`: product, seller `kitchen`, variant `tee-m` (M/black) 15.00, stock 3, tax 12%
/// - `loft`: room, seller `stays`, 80.00 per night, 2 rooms, tax 10%
pub async fn market() -> Database {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let now = Utc::now();
    let catalog = db.catalog();

    for category in [
        category("mains", ItemKind::Food, 5),
        category("apparel", ItemKind::Product, 12),
        category("stays", ItemKind::Room, 10),
    ] {
        catalog.insert_category(&category, now).await.unwrap();
    }

    for item in [dal(), tee(), loft()] {
        catalog.upsert_item(&item, now).await.unwrap();
    }

    db.settings()
        .set_commission_rate(Rate::from_percent(10), now)
        .await
        .unwrap();
    db
}

fn category(id: &str, kind: ItemKind, percent: u32) -> Category {
    Category {
        id: id.into(),
        name: id.into(),
        kind,
        parent_id: None,
        tax_rate: Rate::from_percent(percent),
        inherit_parent_tax: false,
    }
}

fn dal() -> CatalogItem {
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

fn tee() -> CatalogItem {
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
            category_id: "apparel".into(),
        }),
    }
}

fn loft() -> CatalogItem {
    CatalogItem {
        id: "loft".into(),
        seller_id: "stays".into(),
        name: "Loft".into(),
        details: ItemDetails::Room(RoomDetails {
            nightly_price: Money::from_major(80),
            stock: 2,
            category_id: "stays".into(),
        }),
    }
}

pub fn address() -> DeliveryAddress {
    DeliveryAddress {
        name: "Ana Silva".into(),
        phone: "+351 912 345 678".into(),
        street: "Rua Augusta 10".into(),
        city: "Lisbon".into(),
        state: None,
        country: "PT".into(),
        postal_code: "1100-053".into(),
    }
}

pub fn bank() -> BankDetails {
    BankDetails {
        country: "PT".into(),
        bank_name: "Caixa".into(),
        account_name: "Ana Silva".into(),
        account_number: "PT50000201231234567890154".into(),
        ifsc_code: None,
    }
}
