//! # Refund and Return/Exchange Negotiations
//!
//! Two independent request/decision tracks layered on an order. Each track
//! keeps its current state in an explicit field on the order and appends a
//! ledger entry on every step, so the field and `Ledger::latest(family)`
//! always agree.
//!
//! ```text
//!   request ──► Pending ──decide(accept)──► Approved ──► request again ok
//!                  │
//!                  └────decide(reject)──► Rejected ──► request again ok
//!
//!   request while Pending ──► NegotiationPending (InvalidState)
//!   decide without Pending ──► NoPendingNegotiation (InvalidState)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::catalog::{CatalogLookup, ItemDetails, ItemKind};
use crate::error::{CoreError, CoreResult};
use crate::ledger::{EntryDetail, EntryStatus, LedgerEventKind};
use crate::money::Money;
use crate::order::{Order, OrderLine, OrderStatus};
use crate::types::{BankDetails, Decision};
use crate::validation::{validate_bank_details, validate_reason, validate_required};

const REFUND: &str = "refund";
const RETURN_EXCHANGE: &str = "return/exchange";

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    Pending,
    Approved,
    Rejected,
}

impl NegotiationStatus {
    fn from_decision(decision: Decision) -> Self {
        if decision.is_accept() {
            NegotiationStatus::Approved
        } else {
            NegotiationStatus::Rejected
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnAction {
    Return,
    Exchange,
}

impl fmt::Display for ReturnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnAction::Return => f.write_str("Return"),
            ReturnAction::Exchange => f.write_str("Exchange"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundNegotiation {
    pub status: NegotiationStatus,
    pub reason: String,
    pub amount: Money,
    pub bank_details: BankDetails,
    pub item_ids: Vec<String>,
    #[ts(as = "String")]
    pub requested_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnExchangeNegotiation {
    pub status: NegotiationStatus,
    pub action: ReturnAction,
    pub reason: String,
    pub item_ids: Vec<String>,
    /// Buyer (or agent) who opened the request.
    pub requested_by: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub requested_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub decided_at: Option<DateTime<Utc>>,
}

/// Refund request input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundRequest {
    pub item_ids: Vec<String>,
    pub reason: String,
    pub bank_details: BankDetails,
}

/// Return/exchange request input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnRequest {
    pub item_ids: Vec<String>,
    pub reason: String,
    pub action: ReturnAction,
    pub requested_by: String,
}

// =============================================================================
// Order Operations
// =============================================================================

impl Order {
    /// Opens a refund over the product lines named by `item_ids`.
    ///
    /// The amount is the current catalog price of the variant each line's
    /// size/colour selection matches, times the line quantity. Non-product
    /// lines contribute nothing.
    ///
    /// ## Errors
    /// - `NegotiationPending` if a refund is already waiting
    /// - `NotFound` if an id is not part of the order or left the catalog
    /// - `InvalidVariant` if no variant matches a line's selection
    /// - `InvalidRefundAmount` if the total is zero
    pub fn request_refund(
        &mut self,
        request: RefundRequest,
        catalog: &dyn CatalogLookup,
        now: DateTime<Utc>,
    ) -> CoreResult<Money> {
        if matches!(&self.refund, Some(r) if r.status == NegotiationStatus::Pending) {
            return Err(CoreError::NegotiationPending {
                order_id: self.id.clone(),
                family: REFUND,
            });
        }
        if self.status == OrderStatus::PaymentFailed {
            return Err(self.wrong_status("request a refund"));
        }

        let reason = validate_reason("reason", &request.reason)?;
        validate_bank_details(&request.bank_details)?;
        let lines = self.lines_for(&request.item_ids)?;

        let mut amount = Money::zero();
        for line in lines.iter().filter(|l| l.item_kind == ItemKind::Product) {
            amount = amount
                .checked_add(refund_value(line, catalog)?)
                .ok_or_else(|| CoreError::overflow("refund amount"))?;
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidRefundAmount {
                order_id: self.id.clone(),
            });
        }

        let detail = EntryDetail::Refund {
            reason: reason.clone(),
            bank_details: request.bank_details.clone(),
            item_ids: request.item_ids.clone(),
        };
        self.refund = Some(RefundNegotiation {
            status: NegotiationStatus::Pending,
            reason,
            amount,
            bank_details: request.bank_details,
            item_ids: request.item_ids,
            requested_at: now,
            decided_at: None,
        });
        self.record(LedgerEventKind::RefundRequested, amount, EntryStatus::Pending, Some(detail), now);
        Ok(amount)
    }

    /// The seller approves or rejects the pending refund.
    pub fn decide_refund(&mut self, seller_id: &str, decision: Decision, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_seller(seller_id)?;

        let order_id = self.id.clone();
        let refund = match self.refund.as_mut() {
            Some(r) if r.status == NegotiationStatus::Pending => r,
            _ => {
                return Err(CoreError::NoPendingNegotiation {
                    order_id,
                    family: REFUND,
                })
            }
        };

        refund.status = NegotiationStatus::from_decision(decision);
        refund.decided_at = Some(now);
        let amount = refund.amount;
        let detail = EntryDetail::Refund {
            reason: refund.reason.clone(),
            bank_details: refund.bank_details.clone(),
            item_ids: refund.item_ids.clone(),
        };

        self.record(
            LedgerEventKind::RefundDecided { decision },
            amount,
            EntryStatus::for_decision(decision),
            Some(detail),
            now,
        );
        Ok(())
    }

    /// Opens a return or exchange request. The recorded amount is the order
    /// total.
    pub fn initiate_return(&mut self, request: ReturnRequest, now: DateTime<Utc>) -> CoreResult<()> {
        if matches!(&self.return_exchange, Some(r) if r.status == NegotiationStatus::Pending) {
            return Err(CoreError::NegotiationPending {
                order_id: self.id.clone(),
                family: RETURN_EXCHANGE,
            });
        }
        if self.status == OrderStatus::PaymentFailed {
            return Err(self.wrong_status("request a return or exchange"));
        }

        let reason = validate_reason("reason", &request.reason)?;
        let requested_by = validate_required("requested_by", &request.requested_by)?;
        self.lines_for(&request.item_ids)?;

        let amount = self.total();
        let detail = EntryDetail::ReturnExchange {
            reason: reason.clone(),
            item_ids: request.item_ids.clone(),
            requested_by: requested_by.clone(),
        };
        self.return_exchange = Some(ReturnExchangeNegotiation {
            status: NegotiationStatus::Pending,
            action: request.action,
            reason,
            item_ids: request.item_ids,
            requested_by,
            amount,
            requested_at: now,
            decided_at: None,
        });
        self.record(
            LedgerEventKind::ReturnRequested { action: request.action },
            amount,
            EntryStatus::Pending,
            Some(detail),
            now,
        );
        Ok(())
    }

    /// The seller approves or rejects the pending return/exchange.
    pub fn decide_return(&mut self, seller_id: &str, decision: Decision, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_seller(seller_id)?;

        let order_id = self.id.clone();
        let pending = match self.return_exchange.as_mut() {
            Some(r) if r.status == NegotiationStatus::Pending => r,
            _ => {
                return Err(CoreError::NoPendingNegotiation {
                    order_id,
                    family: RETURN_EXCHANGE,
                })
            }
        };

        pending.status = NegotiationStatus::from_decision(decision);
        pending.decided_at = Some(now);
        let action = pending.action;
        let amount = pending.amount;
        let detail = EntryDetail::ReturnExchange {
            reason: pending.reason.clone(),
            item_ids: pending.item_ids.clone(),
            requested_by: pending.requested_by.clone(),
        };

        self.record(
            LedgerEventKind::ReturnDecided { action, decision },
            amount,
            EntryStatus::for_decision(decision),
            Some(detail),
            now,
        );
        Ok(())
    }

    /// Order lines whose catalog item is named in `item_ids`.
    fn lines_for(&self, item_ids: &[String]) -> CoreResult<Vec<&OrderLine>> {
        if item_ids.is_empty() {
            return Err(crate::ValidationError::Required {
                field: "item_ids".to_string(),
            }
            .into());
        }

        for id in item_ids {
            if !self.lines.iter().any(|l| &l.item_id == id) {
                return Err(CoreError::not_found("order item", id.as_str()));
            }
        }

        Ok(self
            .lines
            .iter()
            .filter(|l| item_ids.contains(&l.item_id))
            .collect())
    }
}

/// Current catalog value of one product line, matched by size and colour.
fn refund_value(line: &OrderLine, catalog: &dyn CatalogLookup) -> CoreResult<Money> {
    let item = catalog.require_item(&line.item_id)?;
    let ItemDetails::Product(product) = &item.details else {
        return Err(CoreError::InvalidVariant {
            item_id: line.item_id.clone(),
            reason: "item is no longer a product".to_string(),
        });
    };

    let variant = product
        .variant_by_selection(line.selected_size.as_deref(), line.selected_color.as_deref())
        .ok_or_else(|| CoreError::InvalidVariant {
            item_id: line.item_id.clone(),
            reason: "no variant matches the ordered size and color".to_string(),
        })?;

    variant
        .price
        .checked_mul(line.quantity)
        .ok_or_else(|| CoreError::overflow(format!("refund value of {}", line.item_id)))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ledger::LedgerFamily;
    use crate::order::tests::{catalog, now, placed_order};

    fn bank() -> BankDetails {
        BankDetails {
            country: "US".to_string(),
            bank_name: "First National".to_string(),
            account_name: "J. Doe".to_string(),
            account_number: "000123456789".to_string(),
            ifsc_code: None,
        }
    }

    fn refund_both() -> RefundRequest {
        RefundRequest {
            item_ids: vec!["tee".to_string(), "cap".to_string()],
            reason: "arrived damaged".to_string(),
            bank_details: bank(),
        }
    }

    fn return_request(action: ReturnAction) -> ReturnRequest {
        ReturnRequest {
            item_ids: vec!["tee".to_string()],
            reason: "too small".to_string(),
            action,
            requested_by: "buyer-1".to_string(),
        }
    }

    #[test]
    fn test_refund_amount_sums_matched_variants() {
        let mut order = placed_order();
        let amount = order.request_refund(refund_both(), &catalog(), now()).unwrap();

        assert_eq!(amount, Money::from_major(40));
        let refund = order.refund.as_ref().unwrap();
        assert_eq!(refund.status, NegotiationStatus::Pending);
        assert_eq!(refund.bank_details, bank());

        let entry = order.ledger.latest(LedgerFamily::Refund).unwrap();
        assert_eq!(entry.label(), "Refund Requested");
        assert!(entry.is_pending());
        assert_eq!(entry.amount, Money::from_major(40));
    }

    #[test]
    fn test_second_refund_while_pending() {
        let mut order = placed_order();
        order.request_refund(refund_both(), &catalog(), now()).unwrap();

        let err = order.request_refund(refund_both(), &catalog(), now()).unwrap_err();
        assert!(matches!(err, CoreError::NegotiationPending { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_refund_after_decision() {
        let mut order = placed_order();
        order.request_refund(refund_both(), &catalog(), now()).unwrap();
        order.decide_refund("shop", Decision::Reject, now()).unwrap();

        let decided = order.ledger.latest(LedgerFamily::Refund).unwrap();
        assert_eq!(decided.label(), "Refund Rejected");
        assert_eq!(decided.status, EntryStatus::Rejected);
        assert!(matches!(&decided.detail, Some(EntryDetail::Refund { bank_details, .. }) if *bank_details == bank()));

        order.request_refund(refund_both(), &catalog(), now()).unwrap();
        order.decide_refund("shop", Decision::Accept, now()).unwrap();
        assert_eq!(order.refund.as_ref().unwrap().status, NegotiationStatus::Approved);
        assert_eq!(order.ledger.latest(LedgerFamily::Refund).unwrap().status, EntryStatus::Completed);
    }

    #[test]
    fn test_decide_refund_without_request() {
        let mut order = placed_order();
        let err = order.decide_refund("shop", Decision::Accept, now()).unwrap_err();
        assert!(matches!(err, CoreError::NoPendingNegotiation { .. }));
    }

    #[test]
    fn test_decide_refund_wrong_seller() {
        let mut order = placed_order();
        order.request_refund(refund_both(), &catalog(), now()).unwrap();
        let err = order.decide_refund("intruder", Decision::Accept, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(order.refund.as_ref().unwrap().status, NegotiationStatus::Pending);
    }

    #[test]
    fn test_refund_variant_no_longer_sold() {
        let mut order = placed_order();
        let mut catalog = catalog();
        let mut cap = crate::catalog::CatalogLookup::require_item(&catalog, "cap").unwrap().clone();
        if let ItemDetails::Product(p) = &mut cap.details {
            p.variants[0].color = Some("green".to_string());
        }
        catalog.insert_item(cap);

        let err = order.request_refund(refund_both(), &catalog, now()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidVariant { .. }));
        assert!(order.refund.is_none());
    }

    #[test]
    fn test_refund_unknown_item() {
        let mut order = placed_order();
        let mut request = refund_both();
        request.item_ids.push("not-ordered".to_string());
        assert_eq!(
            order.request_refund(request, &catalog(), now()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_return_flow() {
        let mut order = placed_order();
        order.initiate_return(return_request(ReturnAction::Exchange), now()).unwrap();

        let entry = order.ledger.latest(LedgerFamily::ReturnExchange).unwrap();
        assert_eq!(entry.label(), "Exchange Requested");
        assert_eq!(entry.amount, order.total());

        let err = order
            .initiate_return(return_request(ReturnAction::Return), now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        order.decide_return("shop", Decision::Accept, now()).unwrap();
        assert_eq!(
            order.ledger.latest(LedgerFamily::ReturnExchange).unwrap().label(),
            "Exchange Approved"
        );

        assert!(matches!(
            order.decide_return("shop", Decision::Accept, now()),
            Err(CoreError::NoPendingNegotiation { .. })
        ));
    }

    #[test]
    fn test_tracks_are_independent() {
        let mut order = placed_order();
        order.request_refund(refund_both(), &catalog(), now()).unwrap();
        order.initiate_return(return_request(ReturnAction::Return), now()).unwrap();

        order.decide_return("shop", Decision::Reject, now()).unwrap();
        assert_eq!(order.refund.as_ref().unwrap().status, NegotiationStatus::Pending);
        assert_eq!(
            order.return_exchange.as_ref().unwrap().status,
            NegotiationStatus::Rejected
        );
    }
}
