//! # Cart Service
//!
//! Cart operations for one owner (user or guest session).
//!
//! ## Mutation Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add / remove / update_quantity / clear / set_delivery_address          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock cart:<owner>                                                      │
//! │       │                                                                 │
//! │       ├── load cart (or start an empty one)                             │
//! │       ├── read commission rate (once per call)                          │
//! │       ├── load catalog snapshot for the cart's items (+ new item)      │
//! │       ├── apply the Cart method  ── error → nothing saved              │
//! │       └── save with version check                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  repriced Cart                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::locks::EntityLocks;
use bazaar_core::catalog::CatalogSnapshot;
use bazaar_core::{Cart, CoreResult, DeliveryAddress, NewLine, Owner, Rate};
use bazaar_db::Database;

#[derive(Debug, Clone)]
pub struct CartService {
    db: Database,
    locks: Arc<EntityLocks>,
}

impl CartService {
    pub fn new(db: Database, locks: Arc<EntityLocks>) -> Self {
        CartService { db, locks }
    }

    /// The owner's cart. An owner who never added anything gets an empty,
    /// unsaved cart.
    pub async fn get(&self, owner: &Owner) -> ApiResult<Cart> {
        debug!(%owner, "Getting cart");
        load_or_new(&self.db, owner, Utc::now()).await
    }

    /// Adds a line, or raises the quantity of an identical one.
    pub async fn add(&self, owner: &Owner, line: NewLine) -> ApiResult<Cart> {
        debug!(%owner, item_id = %line.item_id, quantity = line.quantity, "Adding to cart");
        let item_id = line.item_id.clone();

        let cart = self
            .mutate(owner, Some(&item_id), |cart, catalog, rate, now| {
                cart.add_line(line, catalog, rate, now).map(|_| ())
            })
            .await?;

        info!(%owner, %item_id, total = %cart.totals.total, "Cart line added");
        Ok(cart)
    }

    pub async fn remove(&self, owner: &Owner, line_id: &str) -> ApiResult<Cart> {
        debug!(%owner, %line_id, "Removing cart line");

        let cart = self
            .mutate(owner, None, |cart, catalog, rate, now| {
                cart.remove_line(line_id, catalog, rate, now)
            })
            .await?;

        info!(%owner, %line_id, total = %cart.totals.total, "Cart line removed");
        Ok(cart)
    }

    /// Zero removes the line.
    pub async fn update_quantity(&self, owner: &Owner, line_id: &str, quantity: i64) -> ApiResult<Cart> {
        debug!(%owner, %line_id, quantity, "Updating cart quantity");

        let cart = self
            .mutate(owner, None, |cart, catalog, rate, now| {
                cart.update_quantity(line_id, quantity, catalog, rate, now)
            })
            .await?;

        info!(%owner, %line_id, quantity, total = %cart.totals.total, "Cart quantity updated");
        Ok(cart)
    }

    pub async fn clear(&self, owner: &Owner) -> ApiResult<Cart> {
        debug!(%owner, "Clearing cart");

        let cart = self
            .mutate(owner, None, |cart, _, _, now| {
                cart.clear(now);
                Ok(())
            })
            .await?;

        info!(%owner, "Cart cleared");
        Ok(cart)
    }

    pub async fn set_delivery_address(&self, owner: &Owner, address: DeliveryAddress) -> ApiResult<Cart> {
        debug!(%owner, "Setting delivery address");

        let cart = self
            .mutate(owner, None, |cart, _, _, now| cart.set_delivery_address(address, now))
            .await?;

        info!(%owner, "Delivery address set");
        Ok(cart)
    }

    async fn mutate<F>(&self, owner: &Owner, adding: Option<&str>, op: F) -> ApiResult<Cart>
    where
        F: FnOnce(&mut Cart, &CatalogSnapshot, Rate, DateTime<Utc>) -> CoreResult<()>,
    {
        let _guard = self.locks.lock(&EntityLocks::cart_key(owner)).await;
        let now = Utc::now();

        let mut cart = load_or_new(&self.db, owner, now).await?;
        let rate = self.db.settings().commission_rate().await?;

        let mut item_ids = cart.item_ids();
        if let Some(id) = adding {
            item_ids.push(id.to_string());
        }
        let catalog = self.db.catalog().snapshot_for(&item_ids).await?;

        op(&mut cart, &catalog, rate, now)?;
        self.db.carts().save(&mut cart).await?;
        Ok(cart)
    }
}

pub(crate) async fn load_or_new(db: &Database, owner: &Owner, now: DateTime<Utc>) -> ApiResult<Cart> {
    Ok(db
        .carts()
        .get_by_owner(owner)
        .await?
        .unwrap_or_else(|| Cart::new(owner.clone(), now)))
}

// =============================================================================
// Unit Tests
// =============================================================================
