//! # Cart Pricing Engine
//!
//! A cart owned by one user or guest session. Every mutation re-prices every
//! line against the live catalog and recomputes the aggregates.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  add_line / remove_line / update_quantity                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  clone cart → draft                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  apply change to draft ──────────── error ──► cart untouched            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  draft.recompute(catalog, commission)                                   │
//! │       │  every line: price_line(..) ── error ──► cart untouched         │
//! │       │  totals = Σ lines                                               │
//! │       │  requires_delivery_address = any food/product line              │
//! │       ▼                                                                 │
//! │  *cart = draft                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - `totals.total == subtotal + tax + delivery_charge + commission`, exactly
//! - Lines are unique by item, variant and stay dates (re-adding merges)
//! - At most `MAX_CART_LINES` lines, at most `MAX_LINE_QUANTITY` per line

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::catalog::{CatalogItem, CatalogLookup, ItemKind};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::{price_line, LinePricing};
use crate::types::{DeliveryAddress, Owner, Rate};
use crate::validation::{validate_cart_size, validate_delivery_address, validate_quantity};

// =============================================================================
// New Line (input)
// =============================================================================

/// What a caller asks to put in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLine {
    pub item_id: String,
    /// Required for products.
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
    /// Required for rooms.
    #[ts(as = "Option<String>")]
    pub check_in: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub check_out: Option<DateTime<Utc>>,
    pub guest_count: Option<u32>,
}

impl NewLine {
    pub fn new(item_id: impl Into<String>, quantity: i64) -> Self {
        NewLine {
            item_id: item_id.into(),
            variant_id: None,
            quantity,
            selected_size: None,
            selected_color: None,
            check_in: None,
            check_out: None,
            guest_count: None,
        }
    }

    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn with_selection(mut self, size: Option<&str>, color: Option<&str>) -> Self {
        self.selected_size = size.map(str::to_string);
        self.selected_color = color.map(str::to_string);
        self
    }

    pub fn with_stay(mut self, check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> Self {
        self.check_in = Some(check_in);
        self.check_out = Some(check_out);
        self
    }

    pub fn with_guests(mut self, guests: u32) -> Self {
        self.guest_count = Some(guests);
        self
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// A priced cart line. Everything below `guest_count` is recomputed on each
/// mutation and never trusted from input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub id: String,
    pub item_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
    #[ts(as = "Option<String>")]
    pub check_in: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub check_out: Option<DateTime<Utc>>,
    pub guest_count: Option<u32>,

    pub item_kind: ItemKind,
    pub item_name: String,
    pub seller_id: String,
    pub unit_price: Money,
    /// unit_price × quantity
    pub price: Money,
    pub tax_rate: Rate,
    pub tax: Money,
    pub commission: Money,
    pub delivery_charge: Money,
}

impl CartLine {
    /// Builds an unpriced line for `item`. Amounts are filled by the next
    /// recompute.
    pub fn from_new(item: &CatalogItem, new: NewLine) -> Self {
        CartLine {
            id: Uuid::new_v4().to_string(),
            item_id: new.item_id,
            variant_id: new.variant_id,
            quantity: new.quantity,
            selected_size: new.selected_size,
            selected_color: new.selected_color,
            check_in: new.check_in,
            check_out: new.check_out,
            guest_count: new.guest_count,
            item_kind: item.kind(),
            item_name: item.name.clone(),
            seller_id: item.seller_id.clone(),
            unit_price: Money::zero(),
            price: Money::zero(),
            tax_rate: Rate::zero(),
            tax: Money::zero(),
            commission: Money::zero(),
            delivery_charge: Money::zero(),
        }
    }

    /// True when `new` describes the same purchase and should merge into
    /// this line.
    fn same_purchase(&self, new: &NewLine) -> bool {
        let attr_agrees = |mine: &Option<String>, theirs: &Option<String>| {
            theirs.is_none() || mine == theirs
        };

        self.item_id == new.item_id
            && self.variant_id == new.variant_id
            && self.check_in == new.check_in
            && self.check_out == new.check_out
            && attr_agrees(&self.selected_size, &new.selected_size)
            && attr_agrees(&self.selected_color, &new.selected_color)
    }

    fn apply(&mut self, item: &CatalogItem, priced: LinePricing) {
        self.item_kind = item.kind();
        self.item_name = item.name.clone();
        self.seller_id = item.seller_id.clone();
        self.unit_price = priced.unit_price;
        self.price = priced.price;
        self.tax_rate = priced.tax_rate;
        self.tax = priced.tax;
        self.commission = priced.commission;
        self.delivery_charge = priced.delivery_charge;
        if priced.size.is_some() {
            self.selected_size = priced.size;
        }
        if priced.color.is_some() {
            self.selected_color = priced.color;
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Aggregate amounts of a cart, frozen into an order at checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub subtotal: Money,
    pub tax: Money,
    /// Flat sum of every line's delivery charge.
    pub delivery_charge: Money,
    pub commission: Money,
    pub total: Money,
}

impl CartTotals {
    /// Sums the lines. Fails with `AmountOverflow` if an aggregate leaves
    /// the representable range.
    pub fn from_lines(lines: &[CartLine]) -> CoreResult<Self> {
        let sum = |what: &str, pick: fn(&CartLine) -> Money| {
            Money::checked_sum(lines.iter().map(pick))
                .ok_or_else(|| CoreError::overflow(format!("cart {}", what)))
        };
        let subtotal = sum("subtotal", |l| l.price)?;
        let tax = sum("tax", |l| l.tax)?;
        let delivery_charge = sum("delivery charge", |l| l.delivery_charge)?;
        let commission = sum("commission", |l| l.commission)?;
        let total = Money::checked_sum([subtotal, tax, delivery_charge, commission])
            .ok_or_else(|| CoreError::overflow("cart total"))?;

        Ok(CartTotals {
            subtotal,
            tax,
            delivery_charge,
            commission,
            total,
        })
    }

    /// The total identity. Holds for every cart the engine produces.
    pub fn is_reconciled(&self) -> bool {
        self.total == self.subtotal + self.tax + self.delivery_charge + self.commission
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub id: String,
    pub owner: Owner,
    pub lines: Vec<CartLine>,
    pub delivery_address: Option<DeliveryAddress>,
    pub totals: CartTotals,
    /// True iff at least one line is food or a product.
    pub requires_delivery_address: bool,
    /// Optimistic concurrency version, bumped by the store on every save.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new(owner: Owner, now: DateTime<Utc>) -> Self {
        Cart {
            id: Uuid::new_v4().to_string(),
            owner,
            lines: Vec::new(),
            delivery_address: None,
            totals: CartTotals::default(),
            requires_delivery_address: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, line_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    /// Distinct catalog item ids referenced by the cart.
    pub fn item_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lines.iter().map(|l| l.item_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Adds a line, or merges it into a matching line. Returns the id of the
    /// line that now holds the quantity.
    ///
    /// ## Behavior
    /// - Same item, variant and stay dates: quantities add up
    /// - Otherwise: a new line is appended
    pub fn add_line(
        &mut self,
        new: NewLine,
        catalog: &dyn CatalogLookup,
        commission_rate: Rate,
        now: DateTime<Utc>,
    ) -> CoreResult<String> {
        validate_quantity(new.quantity)?;
        let item = catalog.require_item(&new.item_id)?;

        self.mutate(catalog, commission_rate, now, |cart| {
            if let Some(existing) = cart.lines.iter_mut().find(|l| l.same_purchase(&new)) {
                let merged = existing.quantity + new.quantity;
                validate_quantity(merged)?;
                existing.quantity = merged;
                return Ok(existing.id.clone());
            }

            validate_cart_size(cart.lines.len())?;
            let line = CartLine::from_new(item, new);
            let id = line.id.clone();
            cart.lines.push(line);
            Ok(id)
        })
    }

    /// Removes a line by id.
    pub fn remove_line(
        &mut self,
        line_id: &str,
        catalog: &dyn CatalogLookup,
        commission_rate: Rate,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.mutate(catalog, commission_rate, now, |cart| {
            let before = cart.lines.len();
            cart.lines.retain(|l| l.id != line_id);
            if cart.lines.len() == before {
                return Err(CoreError::not_found("cart line", line_id));
            }
            Ok(())
        })
    }

    /// Sets the quantity of a line. Zero removes the line.
    pub fn update_quantity(
        &mut self,
        line_id: &str,
        quantity: i64,
        catalog: &dyn CatalogLookup,
        commission_rate: Rate,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_line(line_id, catalog, commission_rate, now);
        }
        validate_quantity(quantity)?;

        self.mutate(catalog, commission_rate, now, |cart| {
            let line = cart
                .lines
                .iter_mut()
                .find(|l| l.id == line_id)
                .ok_or_else(|| CoreError::not_found("cart line", line_id))?;
            line.quantity = quantity;
            Ok(())
        })
    }

    /// Removes every line. The delivery address is kept.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.totals = CartTotals::default();
        self.requires_delivery_address = false;
        self.updated_at = now;
    }

    /// Validates and stores the delivery address.
    pub fn set_delivery_address(&mut self, address: DeliveryAddress, now: DateTime<Utc>) -> CoreResult<()> {
        validate_delivery_address(&address)?;
        self.delivery_address = Some(address);
        self.requires_delivery_address = self.any_line_requires_delivery();
        self.updated_at = now;
        Ok(())
    }

    /// Re-prices every line and recomputes the aggregates.
    ///
    /// All-or-nothing: on error the cart is left exactly as it was.
    pub fn recompute(&mut self, catalog: &dyn CatalogLookup, commission_rate: Rate) -> CoreResult<()> {
        let mut lines = self.lines.clone();
        for line in &mut lines {
            let item = catalog.require_item(&line.item_id)?;
            let priced = price_line(item, line, catalog, commission_rate)?;
            line.apply(item, priced);
        }

        self.totals = CartTotals::from_lines(&lines)?;
        self.lines = lines;
        self.requires_delivery_address = self.any_line_requires_delivery();
        Ok(())
    }

    fn any_line_requires_delivery(&self) -> bool {
        self.lines.iter().any(|l| l.item_kind.requires_delivery())
    }

    /// Applies `change` to a draft copy, re-prices it and commits only if
    /// both succeed.
    fn mutate<R>(
        &mut self,
        catalog: &dyn CatalogLookup,
        commission_rate: Rate,
        now: DateTime<Utc>,
        change: impl FnOnce(&mut Cart) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut draft = self.clone();
        let result = change(&mut draft)?;
        draft.recompute(catalog, commission_rate)?;
        draft.updated_at = now;
        *self = draft;
        Ok(result)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        CatalogSnapshot, Category, FoodDetails, ItemDetails, ProductDetails, RoomDetails, Variant,
    };
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap()
    }

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

    fn dish(id: &str, price: i64, stock: i64) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            seller_id: "kitchen".to_string(),
            name: format!("Dish {}", id),
            details: ItemDetails::Food(FoodDetails {
                price: Money::from_major(price),
                stock,
                delivery_charge: Money::from_major(1),
                category_id: "mains".into(),
            }),
        }
    }

    fn room() -> CatalogItem {
        CatalogItem {
            id: "deluxe".to_string(),
            seller_id: "hotel".to_string(),
            name: "Deluxe Room".to_string(),
            details: ItemDetails::Room(RoomDetails {
                nightly_price: Money::from_major(50),
                stock: 3,
                category_id: "rooms".into(),
            }),
        }
    }

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new()
            .with_category(category("mains", 500))
            .with_category(category("rooms", 1000))
            .with_item(dish("biryani", 10, 5))
            .with_item(dish("naan", 2, 50))
            .with_item(room())
    }

    fn commission() -> Rate {
        Rate::from_percent(10)
    }

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            name: "Sam Lee".to_string(),
            phone: "+1 555 0100".to_string(),
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: Some("IL".to_string()),
            country: "US".to_string(),
            postal_code: "62701".to_string(),
        }
    }

    #[test]
    fn test_food_line_totals() {
        let mut cart = Cart::new(Owner::user("u-1"), now());
        cart.add_line(NewLine::new("biryani", 2), &catalog(), commission(), now())
            .unwrap();

        let totals = cart.totals;
        assert_eq!(totals.subtotal, Money::from_major(20));
        assert_eq!(totals.tax, Money::from_major(1));
        assert_eq!(totals.delivery_charge, Money::from_major(1));
        assert_eq!(totals.commission, Money::from_major(2));
        assert_eq!(totals.total, Money::from_major(24));
        assert!(totals.is_reconciled());
        assert!(cart.requires_delivery_address);
    }

    #[test]
    fn test_add_same_item_merges() {
        let mut cart = Cart::new(Owner::user("u-1"), now());
        let first = cart
            .add_line(NewLine::new("naan", 2), &catalog(), commission(), now())
            .unwrap();
        let second = cart
            .add_line(NewLine::new("naan", 3), &catalog(), commission(), now())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
    }

    #[test]
    fn test_add_over_stock_leaves_cart_unchanged() {
        let catalog = catalog();
        let mut cart = Cart::new(Owner::guest("sess"), now());
        cart.add_line(NewLine::new("biryani", 4), &catalog, commission(), now())
            .unwrap();
        let before = cart.clone();

        let err = cart
            .add_line(NewLine::new("biryani", 2), &catalog, commission(), now())
            .unwrap_err();

        assert!(matches!(err, CoreError::InvalidQuantity { available: 5, requested: 6, .. }));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_failed_recompute_rolls_back() {
        let mut catalog = catalog();
        let mut cart = Cart::new(Owner::user("u-1"), now());
        cart.add_line(NewLine::new("biryani", 3), &catalog, commission(), now())
            .unwrap();
        let before = cart.clone();

        // Stock drops underneath the cart; any further mutation must fail whole
        catalog.insert_item(dish("biryani", 10, 1));
        assert!(cart
            .add_line(NewLine::new("naan", 1), &catalog, commission(), now())
            .is_err());
        assert_eq!(cart, before);
    }

    #[test]
    fn test_unknown_item_is_not_found() {
        let mut cart = Cart::new(Owner::user("u-1"), now());
        let err = cart
            .add_line(NewLine::new("ghost", 1), &catalog(), commission(), now())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "item", .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_and_zero_removes() {
        let mut cart = Cart::new(Owner::user("u-1"), now());
        let line_id = cart
            .add_line(NewLine::new("naan", 1), &catalog(), commission(), now())
            .unwrap();

        cart.update_quantity(&line_id, 4, &catalog(), commission(), now())
            .unwrap();
        assert_eq!(cart.totals.subtotal, Money::from_major(8));

        cart.update_quantity(&line_id, 0, &catalog(), commission(), now())
            .unwrap();
        assert!(cart.is_empty());
        assert!(cart.totals.total.is_zero());
        assert!(!cart.requires_delivery_address);
    }

    #[test]
    fn test_remove_unknown_line() {
        let mut cart = Cart::new(Owner::user("u-1"), now());
        assert!(matches!(
            cart.remove_line("nope", &catalog(), commission(), now()),
            Err(CoreError::NotFound { entity: "cart line", .. })
        ));
    }

    #[test]
    fn test_room_only_cart_needs_no_address() {
        let check_in = now();
        let mut cart = Cart::new(Owner::user("u-1"), now());
        cart.add_line(
            NewLine::new("deluxe", 1)
                .with_stay(check_in, check_in + chrono::Duration::days(2))
                .with_guests(2),
            &catalog(),
            commission(),
            now(),
        )
        .unwrap();

        assert!(!cart.requires_delivery_address);
        assert_eq!(cart.totals.subtotal, Money::from_major(100));
        assert_eq!(cart.totals.tax, Money::from_major(10));
        assert!(cart.totals.delivery_charge.is_zero());

        cart.add_line(NewLine::new("naan", 1), &catalog(), commission(), now())
            .unwrap();
        assert!(cart.requires_delivery_address);
    }

    #[test]
    fn test_recompute_picks_up_price_changes() {
        let mut catalog = catalog();
        let mut cart = Cart::new(Owner::user("u-1"), now());
        cart.add_line(NewLine::new("naan", 2), &catalog, commission(), now())
            .unwrap();

        catalog.insert_item(dish("naan", 3, 50));
        cart.recompute(&catalog, commission()).unwrap();
        assert_eq!(cart.totals.subtotal, Money::from_major(6));
        assert!(cart.totals.is_reconciled());
    }

    #[test]
    fn test_set_delivery_address_validates() {
        let mut cart = Cart::new(Owner::user("u-1"), now());
        cart.set_delivery_address(address(), now()).unwrap();
        assert!(cart.delivery_address.is_some());

        let mut bad = address();
        bad.phone = "call me".to_string();
        assert!(matches!(
            cart.set_delivery_address(bad, now()),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(cart.delivery_address, Some(address()));
    }

    #[test]
    fn test_clear_keeps_address() {
        let mut cart = Cart::new(Owner::user("u-1"), now());
        cart.add_line(NewLine::new("naan", 2), &catalog(), commission(), now())
            .unwrap();
        cart.set_delivery_address(address(), now()).unwrap();

        cart.clear(now());
        assert!(cart.is_empty());
        assert_eq!(cart.totals, CartTotals::default());
        assert!(cart.delivery_address.is_some());
    }

    #[test]
    fn test_line_limit() {
        let variants = (0..=crate::MAX_CART_LINES)
            .map(|i| Variant {
                id: format!("v{}", i),
                size: Some(format!("S{}", i)),
                color: None,
                price: Money::from_major(1),
                stock: 10,
            })
            .collect();
        let catalog = catalog()
            .with_category(category("misc", 0))
            .with_item(CatalogItem {
                id: "sticker".to_string(),
                seller_id: "shop".to_string(),
                name: "Sticker".to_string(),
                details: ItemDetails::Product(ProductDetails {
                    variants,
                    delivery_charge: Money::zero(),
                    category_id: "misc".into(),
                }),
            });

        let mut cart = Cart::new(Owner::user("u-1"), now());
        for i in 0..crate::MAX_CART_LINES {
            cart.add_line(
                NewLine::new("sticker", 1).with_variant(format!("v{}", i)),
                &catalog,
                Rate::zero(),
                now(),
            )
            .unwrap();
        }

        let overflow = NewLine::new("sticker", 1).with_variant(format!("v{}", crate::MAX_CART_LINES));
        assert!(matches!(
            cart.add_line(overflow, &catalog, Rate::zero(), now()),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(cart.lines.len(), crate::MAX_CART_LINES);
    }
}
