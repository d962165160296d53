//! # Transaction Ledger
//!
//! Append-only event log of one order. Entries are numbered from 1 and are
//! never edited or removed; the store mirrors this with an insert-only table.
//!
//! ## Entry Labels
//! ```text
//! ┌──────────────────────────┬────────────────────────────┬──────────────┐
//! │ Event                    │ Label                      │ Status       │
//! ├──────────────────────────┼────────────────────────────┼──────────────┤
//! │ OrderPlaced              │ Order Placed               │ Completed    │
//! │ PaymentCompleted         │ Payment Completed          │ Completed    │
//! │ PaymentFailed            │ Payment Failed             │ Failed       │
//! │ StatusChanged(s)         │ Order <Status>             │ Completed    │
//! │ PartnerDecision(d)       │ Request Accepted/Rejected  │ Compl./Rej.  │
//! │ RefundRequested          │ Refund Requested           │ Pending      │
//! │ RefundDecided(d)         │ Refund Approved/Rejected   │ Compl./Rej.  │
//! │ ReturnRequested(a)       │ Return/Exchange Requested  │ Pending      │
//! │ ReturnDecided(a, d)      │ Return/Exchange Appr./Rej. │ Compl./Rej.  │
//! └──────────────────────────┴────────────────────────────┴──────────────┘
//! ```

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::negotiation::ReturnAction;
use crate::order::OrderStatus;
use crate::types::{BankDetails, Decision};

// =============================================================================
// Event Kind
// =============================================================================

/// Which part of the order lifecycle an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerFamily {
    Order,
    Payment,
    PartnerRequest,
    Refund,
    ReturnExchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export)]
pub enum LedgerEventKind {
    OrderPlaced,
    PaymentCompleted,
    PaymentFailed,
    StatusChanged { status: OrderStatus },
    PartnerDecision { decision: Decision },
    RefundRequested,
    RefundDecided { decision: Decision },
    ReturnRequested { action: ReturnAction },
    ReturnDecided { action: ReturnAction, decision: Decision },
}

impl LedgerEventKind {
    pub fn family(&self) -> LedgerFamily {
        match self {
            LedgerEventKind::OrderPlaced | LedgerEventKind::StatusChanged { .. } => LedgerFamily::Order,
            LedgerEventKind::PaymentCompleted | LedgerEventKind::PaymentFailed => LedgerFamily::Payment,
            LedgerEventKind::PartnerDecision { .. } => LedgerFamily::PartnerRequest,
            LedgerEventKind::RefundRequested | LedgerEventKind::RefundDecided { .. } => LedgerFamily::Refund,
            LedgerEventKind::ReturnRequested { .. } | LedgerEventKind::ReturnDecided { .. } => {
                LedgerFamily::ReturnExchange
            }
        }
    }
}

impl fmt::Display for LedgerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let approved = |d: &Decision| if d.is_accept() { "Approved" } else { "Rejected" };

        match self {
            LedgerEventKind::OrderPlaced => f.write_str("Order Placed"),
            LedgerEventKind::PaymentCompleted => f.write_str("Payment Completed"),
            LedgerEventKind::PaymentFailed => f.write_str("Payment Failed"),
            LedgerEventKind::StatusChanged { status } => write!(f, "Order {}", status),
            LedgerEventKind::PartnerDecision { decision } => {
                let word = if decision.is_accept() { "Accepted" } else { "Rejected" };
                write!(f, "Request {}", word)
            }
            LedgerEventKind::RefundRequested => f.write_str("Refund Requested"),
            LedgerEventKind::RefundDecided { decision } => write!(f, "Refund {}", approved(decision)),
            LedgerEventKind::ReturnRequested { action } => write!(f, "{} Requested", action),
            LedgerEventKind::ReturnDecided { action, decision } => {
                write!(f, "{} {}", action, approved(decision))
            }
        }
    }
}

// =============================================================================
// Entry
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Completed,
    Pending,
    Rejected,
    Failed,
}

impl EntryStatus {
    /// Status of an entry that records a seller decision.
    pub fn for_decision(decision: Decision) -> Self {
        if decision.is_accept() {
            EntryStatus::Completed
        } else {
            EntryStatus::Rejected
        }
    }
}

/// Extra data some entries carry, frozen at the moment of the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum EntryDetail {
    Payment {
        reference: Option<String>,
        failure_reason: Option<String>,
    },
    Refund {
        reason: String,
        bank_details: BankDetails,
        item_ids: Vec<String>,
    },
    ReturnExchange {
        reason: String,
        item_ids: Vec<String>,
        requested_by: String,
    },
    Cancellation {
        reason: String,
    },
    Delivery {
        partner: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    /// 1-based position in the order's ledger.
    pub seq: i64,
    pub kind: LedgerEventKind,
    pub amount: Money,
    pub status: EntryStatus,
    pub detail: Option<EntryDetail>,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Display label ("Refund Requested", "Order Cancelled", ...).
    pub fn label(&self) -> String {
        self.kind.to_string()
    }

    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// The ordered entries of one order. Only grows.
///
/// Serialized as a bare array of entries, in JSON and in the TypeScript
/// binding alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Ledger(Vec<LedgerEntry>);

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from stored rows, in sequence order.
    pub fn from_entries(mut entries: Vec<LedgerEntry>) -> Self {
        entries.sort_by_key(|e| e.seq);
        Ledger(entries)
    }

    /// Appends an entry and returns it.
    pub fn append(
        &mut self,
        kind: LedgerEventKind,
        amount: Money,
        status: EntryStatus,
        detail: Option<EntryDetail>,
        now: DateTime<Utc>,
    ) -> &LedgerEntry {
        let seq = self.last_seq() + 1;
        self.0.push(LedgerEntry {
            seq,
            kind,
            amount,
            status,
            detail,
            recorded_at: now,
        });
        &self.0[self.0.len() - 1]
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last_seq(&self) -> i64 {
        self.0.last().map_or(0, |e| e.seq)
    }

    /// Entries appended after `seq`. The store uses this to insert only
    /// what is new.
    pub fn entries_after(&self, seq: i64) -> &[LedgerEntry] {
        let start = self.0.partition_point(|e| e.seq <= seq);
        &self.0[start..]
    }

    /// Most recent entry of a family.
    pub fn latest(&self, family: LedgerFamily) -> Option<&LedgerEntry> {
        self.0.iter().rev().find(|e| e.kind.family() == family)
    }
}

// =============================================================================
// Seller View
// =============================================================================

/// Calendar window of a seller's transaction list, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionWindow {
    /// Since the most recent Sunday.
    Week,
    /// Since the first of the month.
    Month,
    /// Since January 1st.
    Year,
    All,
}

impl TransactionWindow {
    /// Midnight opening the window that contains `now`. `None` means no
    /// lower bound.
    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let first_day = match self {
            TransactionWindow::Week => {
                today - Duration::days(i64::from(today.weekday().num_days_from_sunday()))
            }
            TransactionWindow::Month => today.with_day(1)?,
            TransactionWindow::Year => today.with_ordinal(1)?,
            TransactionWindow::All => return None,
        };
        Some(Utc.from_utc_datetime(&first_day.and_hms_opt(0, 0, 0)?))
    }
}

/// A ledger entry as listed for the seller, tagged with its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SellerTransaction {
    pub order_id: String,
    pub order_number: String,
    pub entry: LedgerEntry,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_labels() {
        assert_eq!(LedgerEventKind::OrderPlaced.to_string(), "Order Placed");
        assert_eq!(
            LedgerEventKind::StatusChanged { status: OrderStatus::OutForDelivery }.to_string(),
            "Order Out For Delivery"
        );
        assert_eq!(
            LedgerEventKind::PartnerDecision { decision: Decision::Reject }.to_string(),
            "Request Rejected"
        );
        assert_eq!(
            LedgerEventKind::RefundDecided { decision: Decision::Accept }.to_string(),
            "Refund Approved"
        );
        assert_eq!(
            LedgerEventKind::ReturnRequested { action: ReturnAction::Exchange }.to_string(),
            "Exchange Requested"
        );
        assert_eq!(
            LedgerEventKind::ReturnDecided {
                action: ReturnAction::Return,
                decision: Decision::Reject
            }
            .to_string(),
            "Return Rejected"
        );
    }

    #[test]
    fn test_append_numbers_sequentially() {
        let mut ledger = Ledger::new();
        ledger.append(LedgerEventKind::OrderPlaced, Money::from_major(24), EntryStatus::Completed, None, now());
        let second = ledger.append(
            LedgerEventKind::PaymentCompleted,
            Money::from_major(24),
            EntryStatus::Completed,
            None,
            now(),
        );

        assert_eq!(second.seq, 2);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.entries_after(1).len(), 1);
        assert_eq!(ledger.entries_after(2).len(), 0);
        assert_eq!(ledger.entries_after(0).len(), 2);
    }

    #[test]
    fn test_latest_by_family() {
        let mut ledger = Ledger::new();
        ledger.append(LedgerEventKind::OrderPlaced, Money::zero(), EntryStatus::Completed, None, now());
        ledger.append(LedgerEventKind::RefundRequested, Money::from_major(40), EntryStatus::Pending, None, now());
        ledger.append(
            LedgerEventKind::StatusChanged { status: OrderStatus::Accepted },
            Money::zero(),
            EntryStatus::Completed,
            None,
            now(),
        );

        let refund = ledger.latest(LedgerFamily::Refund).unwrap();
        assert!(refund.is_pending());
        assert_eq!(refund.label(), "Refund Requested");
        assert!(ledger.latest(LedgerFamily::ReturnExchange).is_none());
    }

    #[test]
    fn test_from_entries_sorts() {
        let mut ledger = Ledger::new();
        ledger.append(LedgerEventKind::OrderPlaced, Money::zero(), EntryStatus::Completed, None, now());
        ledger.append(LedgerEventKind::PaymentFailed, Money::zero(), EntryStatus::Failed, None, now());

        let mut rows = ledger.entries().to_vec();
        rows.reverse();
        assert_eq!(Ledger::from_entries(rows), ledger);
    }

    #[test]
    fn test_binding_matches_json_shape() {
        let mut ledger = Ledger::new();
        ledger.append(LedgerEventKind::OrderPlaced, Money::from_major(24), EntryStatus::Completed, None, now());

        let json = serde_json::to_value(&ledger).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().map(Vec::len), Some(1));

        let decl = Ledger::decl();
        assert!(decl.contains("Array<LedgerEntry>"), "{}", decl);
        assert!(!decl.contains("entries"), "{}", decl);
    }

    #[test]
    fn test_transaction_window_starts() {
        // A Thursday
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap();

        assert_eq!(
            TransactionWindow::Week.start(now),
            Some(Utc.with_ymd_and_hms(2026, 1, 11, 0, 0, 0).unwrap())
        );
        assert_eq!(
            TransactionWindow::Month.start(now),
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            TransactionWindow::Year.start(now),
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(TransactionWindow::All.start(now), None);

        // On a Sunday the week opens that same midnight
        let sunday = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        assert_eq!(
            TransactionWindow::Week.start(sunday),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
    }
}
