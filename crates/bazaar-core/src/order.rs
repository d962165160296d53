//! # Order Lifecycle
//!
//! An order is an immutable snapshot of a priced cart plus a status machine,
//! a payment sub-state and an append-only ledger.
//!
//! ## Status Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌─────────┐  accept   ┌──────────┐  assign   ┌──────────────────┐     │
//! │   │ Pending │──────────►│ Accepted │──────────►│ OutForDelivery   │     │
//! │   └────┬────┘           └────┬─────┘           └────────┬─────────┘     │
//! │        │ reject              │ cancel                   │ deliver       │
//! │        ▼                     ▼                          ▼               │
//! │   ┌──────────┐         ┌───────────┐              ┌───────────┐         │
//! │   │ Rejected │         │ Cancelled │◄── cancel ── │ Delivered │         │
//! │   └──────────┘         └───────────┘   (Pending)  └───────────┘         │
//! │                                                                         │
//! │   Online payment declined at creation ──► PaymentFailed                 │
//! │                                                                         │
//! │   Terminal: Rejected, Cancelled, Delivered, PaymentFailed               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment Sub-state
//! `PaymentStatus` runs alongside `OrderStatus`. A successful online charge
//! moves it to `Paid` while the order stays `Pending` for the seller to
//! decide. A declined charge moves it to `Failed` and the order to the
//! terminal `PaymentFailed` status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::{Cart, CartLine, CartTotals};
use crate::catalog::ItemKind;
use crate::error::{CoreError, CoreResult};
use crate::ledger::{EntryDetail, EntryStatus, Ledger, LedgerEventKind};
use crate::money::Money;
use crate::negotiation::{RefundNegotiation, ReturnExchangeNegotiation};
use crate::types::{Decision, DeliveryAddress, Owner, PaymentMethod, Rate};
use crate::validation::{validate_note, validate_reason, validate_required};

// =============================================================================
// Order Status
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    OutForDelivery,
    Delivered,
    Cancelled,
    PaymentFailed,
}

impl OrderStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Rejected | OrderStatus::Cancelled | OrderStatus::PaymentFailed
        )
    }

    /// Edges of the status graph.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Accepted, OutForDelivery)
                | (Accepted, Cancelled)
                | (OutForDelivery, Delivered)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::PaymentFailed => "payment_failed",
        }
    }
}

/// Title-case name, as used in ledger labels ("Out For Delivery").
impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::OutForDelivery => "Out For Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::PaymentFailed => "Payment Failed",
        };
        f.write_str(name)
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Cash on delivery; nothing is charged up front.
    NotRequired,
    /// Online charge not yet settled.
    Pending,
    Paid,
    Failed,
}

/// Result of a gateway charge, as seen by the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved { reference: String },
    Declined { reason: String },
}

// =============================================================================
// Order Line
// =============================================================================

/// A cart line frozen at checkout. Later catalog changes never reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub item_id: String,
    pub item_kind: ItemKind,
    /// Name at time of order (frozen).
    pub item_name: String,
    pub seller_id: String,
    pub variant_id: Option<String>,
    pub selected_size: Option<String>,
    pub selected_color: Option<String>,
    #[ts(as = "Option<String>")]
    pub check_in: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub check_out: Option<DateTime<Utc>>,
    pub guest_count: Option<u32>,
    pub quantity: i64,
    pub unit_price: Money,
    pub price: Money,
    pub tax_rate: Rate,
    pub tax: Money,
    pub commission: Money,
    pub delivery_charge: Money,
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        OrderLine {
            id: line.id.clone(),
            item_id: line.item_id.clone(),
            item_kind: line.item_kind,
            item_name: line.item_name.clone(),
            seller_id: line.seller_id.clone(),
            variant_id: line.variant_id.clone(),
            selected_size: line.selected_size.clone(),
            selected_color: line.selected_color.clone(),
            check_in: line.check_in,
            check_out: line.check_out,
            guest_count: line.guest_count,
            quantity: line.quantity,
            unit_price: line.unit_price,
            price: line.price,
            tax_rate: line.tax_rate,
            tax: line.tax,
            commission: line.commission,
            delivery_charge: line.delivery_charge,
        }
    }
}

/// The seller's answer to the order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PartnerResponse {
    pub decision: Decision,
    pub seller_id: String,
    #[ts(as = "String")]
    pub decided_at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Human-facing number, `#<unix seconds>` of creation.
    pub order_number: String,
    pub buyer: Owner,
    /// Seller of the first line's item; decides the order's requests.
    pub seller_id: String,
    pub lines: Vec<OrderLine>,
    pub totals: CartTotals,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub delivery_address: Option<DeliveryAddress>,
    pub delivery_partner: Option<String>,
    pub cancellation_reason: Option<String>,
    pub partner_response: Option<PartnerResponse>,
    pub refund: Option<RefundNegotiation>,
    pub return_exchange: Option<ReturnExchangeNegotiation>,
    pub ledger: Ledger,
    /// Optimistic concurrency version, bumped by the store on every save.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Snapshots a priced cart into a new pending order.
    ///
    /// ## Rules
    /// - The cart must have at least one line
    /// - Carts with food or product lines must carry a delivery address;
    ///   room-only orders never store one
    /// - Online orders start with `PaymentStatus::Pending` and must be
    ///   settled with [`Order::settle_payment`]
    pub fn place(
        cart: &Cart,
        payment_method: PaymentMethod,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<Order> {
        let first = cart.lines.first().ok_or(CoreError::EmptyCart)?;

        let delivery_address = if cart.requires_delivery_address {
            Some(
                cart.delivery_address
                    .clone()
                    .ok_or(CoreError::MissingDeliveryAddress)?,
            )
        } else {
            None
        };

        let note = validate_note(note)?;

        let payment_status = if payment_method.is_online() {
            PaymentStatus::Pending
        } else {
            PaymentStatus::NotRequired
        };

        let mut order = Order {
            id: Uuid::new_v4().to_string(),
            order_number: format!("#{}", now.timestamp()),
            buyer: cart.owner.clone(),
            seller_id: first.seller_id.clone(),
            lines: cart.lines.iter().map(OrderLine::from).collect(),
            totals: cart.totals,
            payment_method,
            payment_status,
            status: OrderStatus::Pending,
            note,
            delivery_address,
            delivery_partner: None,
            cancellation_reason: None,
            partner_response: None,
            refund: None,
            return_exchange: None,
            ledger: Ledger::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };

        order.record(LedgerEventKind::OrderPlaced, order.totals.total, EntryStatus::Completed, None, now);
        Ok(order)
    }

    #[inline]
    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn contains_kind(&self, kind: ItemKind) -> bool {
        self.lines.iter().any(|l| l.item_kind == kind)
    }

    /// Applies the gateway result of an online charge.
    ///
    /// Payment and fulfilment are tracked apart: an approval only moves
    /// `payment_status` to `Paid`, and `status` stays `Pending` until the
    /// seller decides.
    ///
    /// A decline is recorded on the order (status `PaymentFailed`, ledger
    /// `Payment Failed`) and then returned as `PaymentDeclined` so the
    /// caller can persist the order before surfacing the failure.
    pub fn settle_payment(&mut self, outcome: PaymentOutcome, now: DateTime<Utc>) -> CoreResult<()> {
        if self.payment_status != PaymentStatus::Pending {
            return Err(self.wrong_status("settle payment"));
        }

        match outcome {
            PaymentOutcome::Approved { reference } => {
                self.payment_status = PaymentStatus::Paid;
                let detail = EntryDetail::Payment {
                    reference: Some(reference),
                    failure_reason: None,
                };
                self.record(LedgerEventKind::PaymentCompleted, self.total(), EntryStatus::Completed, Some(detail), now);
                Ok(())
            }
            PaymentOutcome::Declined { reason } => {
                self.payment_status = PaymentStatus::Failed;
                self.status = OrderStatus::PaymentFailed;
                let detail = EntryDetail::Payment {
                    reference: None,
                    failure_reason: Some(reason.clone()),
                };
                self.record(LedgerEventKind::PaymentFailed, self.total(), EntryStatus::Failed, Some(detail), now);
                Err(CoreError::PaymentDeclined {
                    order_id: self.id.clone(),
                    reason,
                })
            }
        }
    }

    /// Moves the order along the status graph.
    ///
    /// ## Errors
    /// - `InvalidOrderStatus` if the order is already terminal
    /// - `InvalidTransition` if the edge is not in the graph
    pub fn update_status(&mut self, next: OrderStatus, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(next, None, now)
    }

    /// The seller accepts or rejects a pending order.
    pub fn partner_decision(&mut self, seller_id: &str, decision: Decision, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_seller(seller_id)?;
        if self.status != OrderStatus::Pending {
            return Err(self.wrong_status("decide the request"));
        }

        self.status = if decision.is_accept() {
            OrderStatus::Accepted
        } else {
            OrderStatus::Rejected
        };
        self.partner_response = Some(PartnerResponse {
            decision,
            seller_id: seller_id.to_string(),
            decided_at: now,
        });
        self.record(
            LedgerEventKind::PartnerDecision { decision },
            self.total(),
            EntryStatus::for_decision(decision),
            None,
            now,
        );
        Ok(())
    }

    /// Hands an accepted order to a courier.
    pub fn assign_delivery_partner(&mut self, seller_id: &str, partner: &str, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_seller(seller_id)?;
        let partner = validate_required("delivery_partner", partner)?;
        if self.status != OrderStatus::Accepted {
            return Err(self.wrong_status("assign a delivery partner"));
        }

        self.delivery_partner = Some(partner.clone());
        self.transition(OrderStatus::OutForDelivery, Some(EntryDetail::Delivery { partner }), now)
    }

    /// Cancels a pending or accepted order.
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let reason = validate_reason("cancellation_reason", reason)?;
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Accepted) {
            return Err(self.wrong_status("cancel"));
        }

        self.cancellation_reason = Some(reason.clone());
        self.transition(OrderStatus::Cancelled, Some(EntryDetail::Cancellation { reason }), now)
    }

    /// Fails with `Unauthorized` unless `seller_id` owns this order.
    pub fn ensure_seller(&self, seller_id: &str) -> CoreResult<()> {
        if self.seller_id != seller_id {
            return Err(CoreError::Unauthorized {
                order_id: self.id.clone(),
                seller_id: seller_id.to_string(),
            });
        }
        Ok(())
    }

    fn transition(&mut self, next: OrderStatus, detail: Option<EntryDetail>, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(self.wrong_status("change status"));
        }
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                order_id: self.id.clone(),
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        self.status = next;
        self.record(
            LedgerEventKind::StatusChanged { status: next },
            self.total(),
            EntryStatus::Completed,
            detail,
            now,
        );
        Ok(())
    }

    pub(crate) fn record(
        &mut self,
        kind: LedgerEventKind,
        amount: Money,
        status: EntryStatus,
        detail: Option<EntryDetail>,
        now: DateTime<Utc>,
    ) {
        self.ledger.append(kind, amount, status, detail, now);
        self.updated_at = now;
    }

    pub(crate) fn wrong_status(&self, operation: &'static str) -> CoreError {
        CoreError::InvalidOrderStatus {
            order_id: self.id.clone(),
            status: self.status.as_str().to_string(),
            operation,
        }
    }
}

// =============================================================================
// Buyer History
// =============================================================================

/// A buyer's orders grouped by the kinds of item they hold. An order with
/// lines of several kinds appears in each of its groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BuyerHistory {
    pub room_bookings: Vec<Order>,
    pub food_orders: Vec<Order>,
    pub product_orders: Vec<Order>,
}

impl BuyerHistory {
    /// Groups orders, keeping their relative order.
    pub fn from_orders(orders: Vec<Order>) -> Self {
        let mut history = BuyerHistory::default();
        for order in orders {
            for kind in [ItemKind::Room, ItemKind::Food, ItemKind::Product] {
                if order.contains_kind(kind) {
                    history.group_mut(kind).push(order.clone());
                }
            }
        }
        history
    }

    pub fn group(&self, kind: ItemKind) -> &[Order] {
        match kind {
            ItemKind::Room => &self.room_bookings,
            ItemKind::Food => &self.food_orders,
            ItemKind::Product => &self.product_orders,
        }
    }

    fn group_mut(&mut self, kind: ItemKind) -> &mut Vec<Order> {
        match kind {
            ItemKind::Room => &mut self.room_bookings,
            ItemKind::Food => &mut self.food_orders,
            ItemKind::Product => &mut self.product_orders,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
