//! # bazaar-core: Pure Business Logic for Bazaar
//!
//! Cart pricing, order lifecycle, ledger and negotiation rules for a
//! multi-vendor marketplace selling rooms, food and products. Zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                bazaar-engine (service layer)                    │   │
//! │  │   CartService, OrderService, payment gateway, entity locks     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │   │
//! │  │   │ catalog  │  │ pricing  │  │   cart   │  │    order     │   │   │
//! │  │   │ kinds,   │─►│ per-kind │─►│ recompute│─►│ status graph │   │   │
//! │  │   │ variants │  │ rules    │  │ totals   │  │ negotiations │   │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────┬───────┘   │   │
//! │  │                                                    ▼           │   │
//! │  │                                              ┌──────────┐      │   │
//! │  │                                              │  ledger  │      │   │
//! │  │                                              └──────────┘      │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Database Layer)                   │   │
//! │  │        SQLite: catalog, carts, orders, insert-only ledger       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer-cent `Money`
//! - [`types`] - `Rate`, `Owner`, addresses, payment method, decisions
//! - [`catalog`] - Item kinds, variants, categories, `CatalogLookup`
//! - [`pricing`] - Per-kind `PriceRule` and line arithmetic
//! - [`cart`] - The cart and its all-or-nothing mutations
//! - [`order`] - Order snapshot and status machine
//! - [`negotiation`] - Refund and return/exchange tracks
//! - [`ledger`] - Append-only order event log
//! - [`error`] - Domain error types and the `ErrorKind` taxonomy
//! - [`validation`] - Field rules
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::catalog::{CatalogItem, CatalogSnapshot, Category, FoodDetails, ItemDetails, ItemKind};
//! use bazaar_core::cart::{Cart, NewLine};
//! use bazaar_core::{Money, Owner, Rate};
//! use chrono::Utc;
//!
//! let catalog = CatalogSnapshot::new()
//!     .with_category(Category {
//!         id: "mains".into(),
//!         name: "Mains".into(),
//!         kind: ItemKind::Food,
//!         parent_id: None,
//!         tax_rate: Rate::from_percent(5),
//!         inherit_parent_tax: false,
//!     })
//!     .with_item(CatalogItem {
//!         id: "dal".into(),
//!         seller_id: "kitchen".into(),
//!         name: "Dal".into(),
//!         details: ItemDetails::Food(FoodDetails {
//!             price: Money::from_major(10),
//!             stock: 10,
//!             delivery_charge: Money::from_major(1),
//!             category_id: "mains".into(),
//!         }),
//!     });
//!
//! let mut cart = Cart::new(Owner::user("u-1"), Utc::now());
//! cart.add_line(NewLine::new("dal", 2), &catalog, Rate::from_percent(10), Utc::now())?;
//!
//! assert_eq!(cart.totals.total, Money::from_major(24));
//! # Ok::<(), bazaar_core::CoreError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod money;
pub mod negotiation;
pub mod order;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartTotals, NewLine};
pub use catalog::{CatalogItem, CatalogLookup, CatalogSnapshot, Category, ItemKind};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use ledger::{
    EntryStatus, Ledger, LedgerEntry, LedgerEventKind, LedgerFamily, SellerTransaction, TransactionWindow,
};
pub use money::Money;
pub use negotiation::{NegotiationStatus, RefundRequest, ReturnAction, ReturnRequest};
pub use order::{BuyerHistory, Order, OrderStatus, PaymentOutcome, PaymentStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity on a single cart line.
///
/// Guards against typos (1000 instead of 10); stock is checked separately.
pub const MAX_LINE_QUANTITY: i64 = 999;
