//! # Seed Data Generator
//!
//! Populates the database with a demo marketplace for development.
//!
//! ## Usage
//! ```bash
//! # 12 items of each kind (default)
//! cargo run -p bazaar-db --bin seed
//!
//! # More items, custom commission
//! cargo run -p bazaar-db --bin seed -- --count 50 --commission 8
//!
//! # Specify database path
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db
//! ```
//!
//! ## Generated Data
//! - Categories: rooms, a food tree and an apparel tree. Some children
//!   inherit the parent's tax rate, some carry their own.
//! - Rooms with nightly prices, dishes with delivery charges, products with
//!   size/colour variants
//! - Items spread across three sellers
//! - The global commission rate

use bazaar_core::catalog::{
    CatalogItem, Category, FoodDetails, ItemDetails, ItemKind, ProductDetails, RoomDetails, Variant,
};
use bazaar_core::{Money, Rate};
use bazaar_db::{Database, DbConfig, DbResult};
use chrono::{DateTime, Utc};
use std::env;
use uuid::Uuid;

const SELLERS: &[&str] = &["seller-harbor", "seller-spice", "seller-loom"];

/// (id, name, kind, parent, tax bps, inherit parent tax)
const CATEGORIES: &[(&str, &str, ItemKind, Option<&str>, u32, bool)] = &[
    ("rooms", "Rooms", ItemKind::Room, None, 1200, false),
    ("food", "Food", ItemKind::Food, None, 500, false),
    ("food-mains", "Mains", ItemKind::Food, Some("food"), 0, true),
    ("food-desserts", "Desserts", ItemKind::Food, Some("food"), 1800, false),
    ("apparel", "Apparel", ItemKind::Product, None, 1200, false),
    ("apparel-tees", "Tees", ItemKind::Product, Some("apparel"), 0, true),
    ("apparel-shoes", "Footwear", ItemKind::Product, Some("apparel"), 1800, false),
];

const ROOMS: &[&str] = &["Standard Double", "Deluxe King", "Family Suite", "Garden Twin"];
const DISHES: &[(&str, &str)] = &[
    ("Dal Tadka", "food-mains"),
    ("Paneer Tikka", "food-mains"),
    ("Veg Biryani", "food-mains"),
    ("Gulab Jamun", "food-desserts"),
    ("Kulfi", "food-desserts"),
];
const PRODUCTS: &[(&str, &str)] = &[
    ("Cotton Tee", "apparel-tees"),
    ("Linen Tee", "apparel-tees"),
    ("Canvas Sneaker", "apparel-shoes"),
];
const SIZES: &[&str] = &["S", "M", "L"];
const COLORS: &[&str] = &["black", "white"];

/// Counts of what a seed run inserted.
#[derive(Debug, Default, PartialEq, Eq)]
struct SeedSummary {
    categories: usize,
    rooms: usize,
    dishes: usize,
    products: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 12;
    let mut commission_pct: u32 = 10;
    let mut db_path = String::from("./bazaar_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(12);
                    i += 1;
                }
            }
            "--commission" | "-r" => {
                if i + 1 < args.len() {
                    commission_pct = args[i + 1].parse().unwrap_or(10).min(100);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bazaar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>        Items per kind (default: 12)");
                println!("  -r, --commission <P>   Commission percent (default: 10)");
                println!("  -d, --db <PATH>        Database file path (default: ./bazaar_dev.db)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Bazaar Seed Data Generator");
    println!("============================");
    println!("Database:   {}", db_path);
    println!("Per kind:   {}", count);
    println!("Commission: {}%", commission_pct);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().count_items().await?;
    if existing > 0 {
        println!("⚠ Database already has {} catalog items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let summary = seed(&db, count, Rate::from_percent(commission_pct), Utc::now()).await?;

    println!();
    println!("✓ {} categories", summary.categories);
    println!("✓ {} rooms", summary.rooms);
    println!("✓ {} dishes", summary.dishes);
    println!("✓ {} products", summary.products);
    println!("  Took {:?}", start.elapsed());
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Inserts categories, `count` items of each kind and the commission rate.
async fn seed(db: &Database, count: usize, commission: Rate, now: DateTime<Utc>) -> DbResult<SeedSummary> {
    let mut summary = SeedSummary::default();
    let catalog = db.catalog();

    // Parents are listed before their children
    for (id, name, kind, parent, bps, inherit) in CATEGORIES {
        catalog
            .insert_category(
                &Category {
                    id: id.to_string(),
                    name: name.to_string(),
                    kind: *kind,
                    parent_id: parent.map(str::to_string),
                    tax_rate: Rate::from_bps(*bps),
                    inherit_parent_tax: *inherit,
                },
                now,
            )
            .await?;
        summary.categories += 1;
    }

    for n in 0..count {
        catalog.upsert_item(&room(n), now).await?;
        summary.rooms += 1;

        catalog.upsert_item(&dish(n), now).await?;
        summary.dishes += 1;

        catalog.upsert_item(&product(n), now).await?;
        summary.products += 1;
    }

    db.settings().set_commission_rate(commission, now).await?;

    Ok(summary)
}

fn seller(n: usize) -> String {
    SELLERS[n % SELLERS.len()].to_string()
}

fn room(n: usize) -> CatalogItem {
    let name = ROOMS[n % ROOMS.len()];
    CatalogItem {
        id: Uuid::new_v4().to_string(),
        seller_id: seller(n),
        name: format!("{} #{}", name, n + 1),
        details: ItemDetails::Room(RoomDetails {
            // 45.00 - 164.00 a night
            nightly_price: Money::from_cents(4_500 + ((n * 1_700) % 12_000) as i64),
            stock: 1 + (n % 4) as i64,
            category_id: "rooms".to_string(),
        }),
    }
}

fn dish(n: usize) -> CatalogItem {
    let (name, category) = DISHES[n % DISHES.len()];
    CatalogItem {
        id: Uuid::new_v4().to_string(),
        seller_id: seller(n + 1),
        name: name.to_string(),
        details: ItemDetails::Food(FoodDetails {
            price: Money::from_cents(399 + ((n * 137) % 900) as i64),
            stock: 20 + (n % 30) as i64,
            delivery_charge: Money::from_cents(if n % 3 == 0 { 0 } else { 149 }),
            category_id: category.to_string(),
        }),
    }
}

fn product(n: usize) -> CatalogItem {
    let (name, category) = PRODUCTS[n % PRODUCTS.len()];
    let base = 1_299 + ((n * 311) % 2_000) as i64;

    let mut variants = Vec::new();
    for (s, size) in SIZES.iter().enumerate() {
        for (c, color) in COLORS.iter().enumerate() {
            variants.push(Variant {
                id: Uuid::new_v4().to_string(),
                size: Some(size.to_string()),
                color: Some(color.to_string()),
                price: Money::from_cents(base + (s as i64) * 200),
                stock: ((n + s + c) % 8) as i64,
            });
        }
    }

    CatalogItem {
        id: Uuid::new_v4().to_string(),
        seller_id: seller(n + 2),
        name: name.to_string(),
        details: ItemDetails::Product(ProductDetails {
            variants,
            delivery_charge: Money::from_cents(299),
            category_id: category.to_string(),
        }),
    }
}
