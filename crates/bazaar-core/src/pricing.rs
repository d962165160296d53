//! # Pricing Rules
//!
//! Per-kind unit pricing and stock validation, plus the per-line arithmetic
//! shared by every kind.
//!
//! ## Line Pricing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price_line(item, line, catalog, commission_rate)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  item.details.rule().quote(..)        ◄── PriceRule, one impl per kind  │
//! │       │   Room:    nightly × ceil(stay / 1 day), no delivery            │
//! │       │   Food:    dish price, flat delivery                            │
//! │       │   Product: variant price, flat delivery                         │
//! │       ▼                                                                 │
//! │  unit_price > 0?           no → InvalidPrice                            │
//! │  quantity ≤ stock?         no → InvalidQuantity                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  price      = unit_price × quantity                                     │
//! │  tax        = price × tax_rate        (half-up, cents)                  │
//! │  commission = price × commission_rate (half-up, cents)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::cart::CartLine;
use crate::catalog::{CatalogItem, CatalogLookup, FoodDetails, ItemDetails, ProductDetails, RoomDetails};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Rate;
use crate::validation::{validate_quantity, validate_stay};

const SECONDS_PER_NIGHT: i64 = 86_400;

/// What one unit of a line costs, before quantity is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitQuote {
    pub unit_price: Money,
    pub delivery_charge: Money,
    pub tax_rate: Rate,
    /// Units available to satisfy the line.
    pub stock: i64,
    /// Variant attributes the line resolved to (products only).
    pub size: Option<String>,
    pub color: Option<String>,
}

/// Kind-specific pricing and validation.
pub trait PriceRule {
    fn quote(&self, item_id: &str, line: &CartLine, catalog: &dyn CatalogLookup) -> CoreResult<UnitQuote>;
}

impl ItemDetails {
    /// The pricing rule for this item's kind.
    pub fn rule(&self) -> &dyn PriceRule {
        match self {
            ItemDetails::Room(d) => d as &dyn PriceRule,
            ItemDetails::Food(d) => d as &dyn PriceRule,
            ItemDetails::Product(d) => d as &dyn PriceRule,
        }
    }
}

/// Number of nights billed for a stay. Any part-day counts as a night.
pub fn stay_nights(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i64 {
    let seconds = (check_out - check_in).num_seconds();
    (seconds + SECONDS_PER_NIGHT - 1) / SECONDS_PER_NIGHT
}

impl PriceRule for RoomDetails {
    fn quote(&self, item_id: &str, line: &CartLine, catalog: &dyn CatalogLookup) -> CoreResult<UnitQuote> {
        let (check_in, check_out) = validate_stay(line.check_in, line.check_out)?;
        let nights = stay_nights(check_in, check_out);
        let unit_price = self
            .nightly_price
            .checked_mul(nights)
            .ok_or_else(|| CoreError::overflow(format!("stay price of {}", item_id)))?;

        Ok(UnitQuote {
            unit_price,
            delivery_charge: Money::zero(),
            tax_rate: catalog.effective_tax_rate(&self.category_id)?,
            stock: self.stock,
            size: None,
            color: None,
        })
    }
}

impl PriceRule for FoodDetails {
    fn quote(&self, _item_id: &str, _line: &CartLine, catalog: &dyn CatalogLookup) -> CoreResult<UnitQuote> {
        Ok(UnitQuote {
            unit_price: self.price,
            delivery_charge: self.delivery_charge,
            tax_rate: catalog.effective_tax_rate(&self.category_id)?,
            stock: self.stock,
            size: None,
            color: None,
        })
    }
}

impl PriceRule for ProductDetails {
    fn quote(&self, item_id: &str, line: &CartLine, catalog: &dyn CatalogLookup) -> CoreResult<UnitQuote> {
        let invalid = |reason: String| CoreError::InvalidVariant {
            item_id: item_id.to_string(),
            reason,
        };

        let variant_id = line
            .variant_id
            .as_deref()
            .ok_or_else(|| invalid("no variant selected".to_string()))?;
        let variant = self
            .variant(variant_id)
            .ok_or_else(|| invalid(format!("variant {} does not exist", variant_id)))?;

        // An explicit selection must agree with the chosen variant
        if line.selected_size.is_some() && line.selected_size != variant.size {
            return Err(invalid(format!("size does not match variant {}", variant_id)));
        }
        if line.selected_color.is_some() && line.selected_color != variant.color {
            return Err(invalid(format!("color does not match variant {}", variant_id)));
        }

        Ok(UnitQuote {
            unit_price: variant.price,
            delivery_charge: self.delivery_charge,
            tax_rate: catalog.effective_tax_rate(&self.category_id)?,
            stock: variant.stock,
            size: variant.size.clone(),
            color: variant.color.clone(),
        })
    }
}

// =============================================================================
// Line Pricing
// =============================================================================

/// Computed amounts for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePricing {
    pub unit_price: Money,
    pub price: Money,
    pub tax_rate: Rate,
    pub tax: Money,
    pub commission: Money,
    pub delivery_charge: Money,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// Prices one line against the live catalog.
pub fn price_line(
    item: &CatalogItem,
    line: &CartLine,
    catalog: &dyn CatalogLookup,
    commission_rate: Rate,
) -> CoreResult<LinePricing> {
    validate_quantity(line.quantity)?;

    let quote = item.details.rule().quote(&item.id, line, catalog)?;

    if !quote.unit_price.is_positive() {
        return Err(CoreError::InvalidPrice {
            item_id: item.id.clone(),
        });
    }

    if line.quantity > quote.stock {
        return Err(CoreError::InvalidQuantity {
            item_id: item.id.clone(),
            available: quote.stock.max(0),
            requested: line.quantity,
        });
    }

    let overflow = || CoreError::overflow(format!("line price of {}", item.id));
    let price = quote.unit_price.checked_mul(line.quantity).ok_or_else(overflow)?;
    let tax = price.percentage(quote.tax_rate);
    let commission = price.percentage(commission_rate);
    Money::checked_sum([price, tax, commission, quote.delivery_charge]).ok_or_else(overflow)?;

    Ok(LinePricing {
        unit_price: quote.unit_price,
        price,
        tax_rate: quote.tax_rate,
        tax,
        commission,
        delivery_charge: quote.delivery_charge,
        size: quote.size,
        color: quote.color,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::NewLine;
    use crate::catalog::{CatalogSnapshot, Category, ItemKind, Variant};
    use chrono::TimeZone;

    fn category(id: &str, bps: u32) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_string(),
            kind: ItemKind::Food,
            parent_id: None,
            tax_rate: Rate::from_bps(bps),
            inherit_parent_tax: false,
        }
    }

    fn item(id: &str, details: ItemDetails) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            seller_id: "seller-1".to_string(),
            name: id.to_string(),
            details,
        }
    }

    fn dish(price: i64, stock: i64) -> CatalogItem {
        item(
            "dish",
            ItemDetails::Food(FoodDetails {
                price: Money::from_major(price),
                stock,
                delivery_charge: Money::from_major(1),
                category_id: "mains".into(),
            }),
        )
    }

    fn catalog_with(item: &CatalogItem) -> CatalogSnapshot {
        CatalogSnapshot::new()
            .with_category(category("mains", 500))
            .with_category(category("suites", 1200))
            .with_category(category("apparel", 1700))
            .with_item(item.clone())
    }

    #[test]
    fn test_food_line() {
        let dish = dish(10, 5);
        let catalog = catalog_with(&dish);
        let line = CartLine::from_new(&dish, NewLine::new("dish", 2));

        let priced = price_line(&dish, &line, &catalog, Rate::from_percent(10)).unwrap();

        assert_eq!(priced.price, Money::from_major(20));
        assert_eq!(priced.tax, Money::from_major(1));
        assert_eq!(priced.commission, Money::from_major(2));
        assert_eq!(priced.delivery_charge, Money::from_major(1));
    }

    #[test]
    fn test_quantity_over_stock() {
        let dish = dish(10, 3);
        let catalog = catalog_with(&dish);
        let line = CartLine::from_new(&dish, NewLine::new("dish", 5));

        let err = price_line(&dish, &line, &catalog, Rate::zero()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidQuantity { available: 3, requested: 5, .. }
        ));
    }

    #[test]
    fn test_zero_price_rejected() {
        let dish = dish(0, 3);
        let catalog = catalog_with(&dish);
        let line = CartLine::from_new(&dish, NewLine::new("dish", 1));

        assert!(matches!(
            price_line(&dish, &line, &catalog, Rate::zero()),
            Err(CoreError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_stay_nights_rounds_up() {
        let check_in = Utc.with_ymd_and_hms(2026, 5, 1, 14, 0, 0).unwrap();
        assert_eq!(stay_nights(check_in, check_in + chrono::Duration::days(2)), 2);
        assert_eq!(stay_nights(check_in, check_in + chrono::Duration::hours(49)), 3);
        assert_eq!(stay_nights(check_in, check_in + chrono::Duration::hours(1)), 1);
    }

    #[test]
    fn test_room_line() {
        let suite = item(
            "suite",
            ItemDetails::Room(RoomDetails {
                nightly_price: Money::from_major(80),
                stock: 2,
                category_id: "suites".into(),
            }),
        );
        let catalog = catalog_with(&suite);
        let check_in = Utc.with_ymd_and_hms(2026, 5, 1, 14, 0, 0).unwrap();
        let line = CartLine::from_new(
            &suite,
            NewLine::new("suite", 1).with_stay(check_in, check_in + chrono::Duration::days(3)),
        );

        let priced = price_line(&suite, &line, &catalog, Rate::zero()).unwrap();
        assert_eq!(priced.unit_price, Money::from_major(240));
        assert_eq!(priced.tax, Money::from_cents(2880));
        assert!(priced.delivery_charge.is_zero());
    }

    #[test]
    fn test_long_stay_at_huge_price_overflows() {
        let palace = item(
            "palace",
            ItemDetails::Room(RoomDetails {
                nightly_price: Money::from_cents(i64::MAX / 10),
                stock: 1,
                category_id: "suites".into(),
            }),
        );
        let catalog = catalog_with(&palace);
        let check_in = Utc.with_ymd_and_hms(2026, 5, 1, 14, 0, 0).unwrap();
        let line = CartLine::from_new(
            &palace,
            NewLine::new("palace", 1).with_stay(check_in, check_in + chrono::Duration::days(30)),
        );

        assert!(matches!(
            price_line(&palace, &line, &catalog, Rate::zero()),
            Err(CoreError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_room_without_dates() {
        let suite = item(
            "suite",
            ItemDetails::Room(RoomDetails {
                nightly_price: Money::from_major(80),
                stock: 2,
                category_id: "suites".into(),
            }),
        );
        let catalog = catalog_with(&suite);
        let line = CartLine::from_new(&suite, NewLine::new("suite", 1));

        assert!(matches!(
            price_line(&suite, &line, &catalog, Rate::zero()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_product_variant_resolution() {
        let shirt = item(
            "shirt",
            ItemDetails::Product(ProductDetails {
                variants: vec![Variant {
                    id: "v1".into(),
                    size: Some("M".into()),
                    color: Some("blue".into()),
                    price: Money::from_major(15),
                    stock: 2,
                }],
                delivery_charge: Money::from_cents(250),
                category_id: "apparel".into(),
            }),
        );
        let catalog = catalog_with(&shirt);

        let ok = CartLine::from_new(&shirt, NewLine::new("shirt", 2).with_variant("v1"));
        let priced = price_line(&shirt, &ok, &catalog, Rate::zero()).unwrap();
        assert_eq!(priced.price, Money::from_major(30));
        assert_eq!(priced.size.as_deref(), Some("M"));

        let missing = CartLine::from_new(&shirt, NewLine::new("shirt", 1));
        assert!(matches!(
            price_line(&shirt, &missing, &catalog, Rate::zero()),
            Err(CoreError::InvalidVariant { .. })
        ));

        let unknown = CartLine::from_new(&shirt, NewLine::new("shirt", 1).with_variant("v9"));
        assert!(matches!(
            price_line(&shirt, &unknown, &catalog, Rate::zero()),
            Err(CoreError::InvalidVariant { .. })
        ));

        let wrong_size = CartLine::from_new(
            &shirt,
            NewLine::new("shirt", 1)
                .with_variant("v1")
                .with_selection(Some("XL"), None),
        );
        assert!(matches!(
            price_line(&shirt, &wrong_size, &catalog, Rate::zero()),
            Err(CoreError::InvalidVariant { .. })
        ));
    }

    #[test]
    fn test_missing_category_fails() {
        let dish = item(
            "dish",
            ItemDetails::Food(FoodDetails {
                price: Money::from_major(10),
                stock: 5,
                delivery_charge: Money::zero(),
                category_id: "deleted".into(),
            }),
        );
        let catalog = catalog_with(&dish);
        let line = CartLine::from_new(&dish, NewLine::new("dish", 1));

        assert!(matches!(
            price_line(&dish, &line, &catalog, Rate::zero()),
            Err(CoreError::NotFound { entity: "category", .. })
        ));
    }
}
