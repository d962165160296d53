//! # Order Service
//!
//! Checkout and every later step of an order's life.
//!
//! ## Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_order(buyer, method, note)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock cart:<buyer>                                                     │
//! │       ├── load cart, reprice against live catalog + commission         │
//! │       ├── Order::place  (snapshot, "Order Placed")                     │
//! │       │                                                                 │
//! │       ├── cash ── BEGIN insert order + save cleared cart COMMIT        │
//! │       │                                                                 │
//! │       └── online                                                        │
//! │             ├── lock order:<id>, insert order  (payment pending)       │
//! │             ├── charge_with_timeout                                    │
//! │             ├── declined → save payment_failed order, cart untouched,  │
//! │             │              ExternalFailure                              │
//! │             └── approved → BEGIN save paid order + cleared cart COMMIT │
//! │                            (cart changed meanwhile: save order only)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Later Steps
//! Status changes, seller decisions, refunds and returns all run the same
//! cycle under `order:<id>`: load, apply the `Order` method, save with a
//! version check. A rule violation saves nothing.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cart_service::load_or_new;
use crate::error::{ApiError, ApiResult};
use crate::locks::EntityLocks;
use crate::payment::{charge_with_timeout, ChargeRequest, PaymentGateway};
use bazaar_core::{
    BuyerHistory, Cart, CoreResult, Decision, ItemKind, LedgerEntry, Money, Order, OrderStatus, Owner,
    PaymentMethod, RefundRequest, ReturnRequest, SellerTransaction, TransactionWindow,
};
use bazaar_db::{Database, DbError};

#[derive(Clone)]
pub struct OrderService {
    db: Database,
    locks: Arc<EntityLocks>,
    gateway: Arc<dyn PaymentGateway>,
    payment_timeout: Duration,
}

impl OrderService {
    pub fn new(
        db: Database,
        locks: Arc<EntityLocks>,
        gateway: Arc<dyn PaymentGateway>,
        payment_timeout: Duration,
    ) -> Self {
        OrderService {
            db,
            locks,
            gateway,
            payment_timeout,
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Turns the buyer's cart into an order.
    ///
    /// The cart is repriced first, so the order carries current prices,
    /// stock checks and the current commission. On success the cart is
    /// emptied in the same transaction that stores the order (or its paid
    /// state). An online order is stored before the charge, so an approved
    /// payment never lacks an order.
    ///
    /// ## Errors
    /// - `InvalidInput` for an empty cart, a missing delivery address or a
    ///   line that no longer prices
    /// - `ExternalFailure` when an online payment is declined, fails or
    ///   times out; the `payment_failed` order is stored and the cart kept
    pub async fn create_order(
        &self,
        buyer: &Owner,
        payment_method: PaymentMethod,
        note: Option<&str>,
    ) -> ApiResult<Order> {
        debug!(%buyer, method = payment_method.as_str(), "Creating order");

        let _guard = self.locks.lock(&EntityLocks::cart_key(buyer)).await;
        let now = Utc::now();

        let mut cart = load_or_new(&self.db, buyer, now).await?;
        let rate = self.db.settings().commission_rate().await?;
        let catalog = self.db.catalog().snapshot_for(&cart.item_ids()).await?;
        cart.recompute(&catalog, rate)?;

        let mut order = Order::place(&cart, payment_method, note, now)?;

        if payment_method.is_online() {
            self.charge_and_settle(&mut order, &mut cart).await?;
        } else {
            cart.clear(Utc::now());
            self.db.orders().place_order(&mut order, &mut cart).await?;
        }

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            seller_id = %order.seller_id,
            total = %order.total(),
            "Order created"
        );
        Ok(order)
    }

    /// Online checkout. The order is stored (payment pending) before the
    /// gateway is called, so an approved charge always has an order behind
    /// it.
    async fn charge_and_settle(&self, order: &mut Order, cart: &mut Cart) -> ApiResult<()> {
        // Held until settled so seller or buyer actions wait for the charge
        let _guard = self.locks.lock(&EntityLocks::order_key(&order.id)).await;
        self.db.orders().insert(order).await?;

        let request = ChargeRequest {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            amount: order.total(),
            method: order.payment_method,
        };
        let outcome = charge_with_timeout(self.gateway.as_ref(), &request, self.payment_timeout).await;

        if let Err(err) = order.settle_payment(outcome, Utc::now()) {
            self.db.orders().save(order).await?;
            warn!(order_id = %order.id, buyer = %order.buyer, "Order stored as payment failed");
            return Err(err.into());
        }

        cart.clear(Utc::now());
        match self.db.orders().settle_checkout(order, cart).await {
            Ok(()) => Ok(()),
            Err(DbError::VersionConflict { .. }) => {
                // The cart changed during the charge; keep the paid order and
                // leave the newer cart alone.
                warn!(order_id = %order.id, cart_id = %cart.id, "Cart changed during payment, not cleared");
                self.db.orders().save(order).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, order_id: &str) -> ApiResult<Order> {
        debug!(%order_id, "Getting order");
        self.db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Order", order_id))
    }

    /// Ledger entries in sequence order.
    pub async fn ledger(&self, order_id: &str) -> ApiResult<Vec<LedgerEntry>> {
        debug!(%order_id, "Getting ledger");
        let entries = self.db.orders().ledger(order_id).await?;

        // Every stored order has at least its "Order Placed" entry
        if entries.is_empty() {
            return Err(ApiError::not_found("Order", order_id));
        }
        Ok(entries)
    }

    /// Newest first.
    pub async fn orders_for_buyer(&self, buyer: &Owner) -> ApiResult<Vec<Order>> {
        debug!(%buyer, "Listing buyer orders");
        Ok(self.db.orders().for_buyer(buyer).await?)
    }

    /// Buyer's orders grouped into room bookings, food and product orders.
    pub async fn buyer_history(&self, buyer: &Owner) -> ApiResult<BuyerHistory> {
        debug!(%buyer, "Getting buyer history");
        let orders = self.db.orders().for_buyer(buyer).await?;
        Ok(BuyerHistory::from_orders(orders))
    }

    /// One group of the buyer's history, newest first.
    pub async fn buyer_history_by_kind(&self, buyer: &Owner, kind: ItemKind) -> ApiResult<Vec<Order>> {
        debug!(%buyer, kind = kind.as_str(), "Getting buyer history by kind");
        Ok(self.db.orders().for_buyer_by_kind(buyer, kind).await?)
    }

    /// Every order of a seller, newest first. `kind` keeps only orders
    /// with a line of that kind.
    pub async fn orders_for_seller(&self, seller_id: &str, kind: Option<ItemKind>) -> ApiResult<Vec<Order>> {
        debug!(%seller_id, ?kind, "Listing seller orders");
        Ok(self.db.orders().for_seller(seller_id, kind).await?)
    }

    /// Ledger entries of the seller's orders inside the current calendar
    /// window, newest first.
    pub async fn seller_transactions(
        &self,
        seller_id: &str,
        window: TransactionWindow,
    ) -> ApiResult<Vec<SellerTransaction>> {
        let since = window.start(Utc::now());
        debug!(%seller_id, ?window, ?since, "Listing seller transactions");
        Ok(self.db.orders().seller_transactions(seller_id, since).await?)
    }

    /// Pending orders of `seller_id` with at least one line of `kind`.
    pub async fn pending_requests(&self, seller_id: &str, kind: ItemKind) -> ApiResult<Vec<Order>> {
        debug!(%seller_id, kind = kind.as_str(), "Listing pending requests");
        Ok(self.db.orders().pending_for_seller(seller_id, kind).await?)
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub async fn update_status(&self, order_id: &str, next: OrderStatus) -> ApiResult<Order> {
        let order = self
            .mutate_order(order_id, |order, now| order.update_status(next, now))
            .await?;

        info!(%order_id, status = next.as_str(), "Order status updated");
        Ok(order)
    }

    /// The seller accepts or rejects a pending order.
    pub async fn partner_decision(&self, order_id: &str, seller_id: &str, decision: Decision) -> ApiResult<Order> {
        let order = self
            .mutate_order(order_id, |order, now| order.partner_decision(seller_id, decision, now))
            .await?;

        info!(%order_id, %seller_id, ?decision, "Partner decision recorded");
        Ok(order)
    }

    pub async fn assign_delivery_partner(&self, order_id: &str, seller_id: &str, partner: &str) -> ApiResult<Order> {
        let order = self
            .mutate_order(order_id, |order, now| {
                order.assign_delivery_partner(seller_id, partner, now)
            })
            .await?;

        info!(%order_id, %partner, "Delivery partner assigned");
        Ok(order)
    }

    pub async fn cancel(&self, order_id: &str, reason: &str) -> ApiResult<Order> {
        let order = self
            .mutate_order(order_id, |order, now| order.cancel(reason, now))
            .await?;

        info!(%order_id, "Order cancelled");
        Ok(order)
    }

    // =========================================================================
    // Negotiations
    // =========================================================================

    /// Opens a refund priced against the current catalog. Returns the order
    /// and the requested amount.
    pub async fn request_refund(&self, order_id: &str, request: RefundRequest) -> ApiResult<(Order, Money)> {
        debug!(%order_id, items = request.item_ids.len(), "Requesting refund");

        let _guard = self.locks.lock(&EntityLocks::order_key(order_id)).await;
        let mut order = self.get(order_id).await?;

        let item_ids: Vec<String> = order.lines.iter().map(|l| l.item_id.clone()).collect();
        let catalog = self.db.catalog().snapshot_for(&item_ids).await?;

        let amount = order.request_refund(request, &catalog, Utc::now())?;
        self.db.orders().save(&mut order).await?;

        info!(%order_id, %amount, "Refund requested");
        Ok((order, amount))
    }

    pub async fn decide_refund(&self, order_id: &str, seller_id: &str, decision: Decision) -> ApiResult<Order> {
        let order = self
            .mutate_order(order_id, |order, now| order.decide_refund(seller_id, decision, now))
            .await?;

        info!(%order_id, %seller_id, ?decision, "Refund decided");
        Ok(order)
    }

    pub async fn initiate_return(&self, order_id: &str, request: ReturnRequest) -> ApiResult<Order> {
        let action = request.action;
        let order = self
            .mutate_order(order_id, |order, now| order.initiate_return(request, now))
            .await?;

        info!(%order_id, ?action, "Return requested");
        Ok(order)
    }

    pub async fn decide_return(&self, order_id: &str, seller_id: &str, decision: Decision) -> ApiResult<Order> {
        let order = self
            .mutate_order(order_id, |order, now| order.decide_return(seller_id, decision, now))
            .await?;

        info!(%order_id, %seller_id, ?decision, "Return decided");
        Ok(order)
    }

    async fn mutate_order<F>(&self, order_id: &str, op: F) -> ApiResult<Order>
    where
        F: FnOnce(&mut Order, DateTime<Utc>) -> CoreResult<()>,
    {
        let _guard = self.locks.lock(&EntityLocks::order_key(order_id)).await;
        let mut order = self.get(order_id).await?;

        op(&mut order, Utc::now())?;
        self.db.orders().save(&mut order).await?;
        Ok(order)
    }
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("payment_timeout", &self.payment_timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
