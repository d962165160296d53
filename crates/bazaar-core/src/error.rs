//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Pricing, lifecycle and negotiation failures    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  └── DbError          - Database failures, version conflicts           │
//! │                                                                         │
//! │  bazaar-engine errors                                                  │
//! │  └── ApiError         - What callers see (serialized code + message)   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Caller       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` belongs to exactly one [`ErrorKind`], the taxonomy callers
//! branch on. The variant carries the detail for logs and messages.

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// The failure taxonomy shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown item, category, cart line or order.
    NotFound,
    /// Caller supplied something unusable (bad quantity, missing field, ...).
    InvalidInput,
    /// The entity exists but is not in a state that allows the operation.
    InvalidState,
    /// An external collaborator (payment gateway) failed.
    ExternalFailure,
    /// The acting seller does not own the order.
    Unauthorized,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    ///
    /// ## When This Occurs
    /// - Cart line references an item that was removed from the catalog
    /// - Item references a category (or parent category) that is missing
    /// - Refund names an item that is not part of the order
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Requested quantity exceeds stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 5)
    ///      │
    ///      ▼
    /// Recompute: variant stock = 3
    ///      │
    ///      ▼
    /// InvalidQuantity { item_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Cart is left exactly as it was before the add
    /// ```
    #[error("Insufficient stock for {item_id}: available {available}, requested {requested}")]
    InvalidQuantity {
        item_id: String,
        available: i64,
        requested: i64,
    },

    /// No usable variant for a product line.
    #[error("Invalid variant for {item_id}: {reason}")]
    InvalidVariant { item_id: String, reason: String },

    /// The resolved unit price was zero or negative.
    #[error("Item {item_id} resolved to a non-positive price")]
    InvalidPrice { item_id: String },

    /// An amount left the representable range (huge price × quantity or
    /// stay length).
    #[error("Amount out of range while computing {what}")]
    AmountOverflow { what: String },

    /// Order creation from a cart without lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The cart holds food or product lines but no delivery address.
    #[error("A delivery address is required for food and product orders")]
    MissingDeliveryAddress,

    /// A computed refund came out as zero.
    #[error("Refund amount for order {order_id} must be positive")]
    InvalidRefundAmount { order_id: String },

    /// Transition is not part of the order state graph.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: String,
        to: String,
    },

    /// Order is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Changing the status of a delivered or cancelled order
    /// - Deciding an order request that is no longer pending
    /// - Cancelling an order that is already out for delivery
    #[error("Order {order_id} is {status}, cannot {operation}")]
    InvalidOrderStatus {
        order_id: String,
        status: String,
        operation: &'static str,
    },

    /// A negotiation of this family is already waiting for a decision.
    #[error("A {family} request is already pending for order {order_id}")]
    NegotiationPending {
        order_id: String,
        family: &'static str,
    },

    /// Decision made without a pending negotiation.
    #[error("No pending {family} request for order {order_id}")]
    NoPendingNegotiation {
        order_id: String,
        family: &'static str,
    },

    /// The payment gateway declined, timed out or errored.
    #[error("Payment for order {order_id} failed: {reason}")]
    PaymentDeclined { order_id: String, reason: String },

    /// The acting seller does not own the order.
    #[error("Order {order_id} not found or unauthorized for seller {seller_id}")]
    Unauthorized { order_id: String, seller_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Maps the error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InvalidQuantity { .. }
            | CoreError::InvalidVariant { .. }
            | CoreError::InvalidPrice { .. }
            | CoreError::AmountOverflow { .. }
            | CoreError::EmptyCart
            | CoreError::MissingDeliveryAddress
            | CoreError::InvalidRefundAmount { .. }
            | CoreError::Validation(_) => ErrorKind::InvalidInput,
            CoreError::InvalidTransition { .. }
            | CoreError::InvalidOrderStatus { .. }
            | CoreError::NegotiationPending { .. }
            | CoreError::NoPendingNegotiation { .. } => ErrorKind::InvalidState,
            CoreError::PaymentDeclined { .. } => ErrorKind::ExternalFailure,
            CoreError::Unauthorized { .. } => ErrorKind::Unauthorized,
        }
    }

    pub fn overflow(what: impl Into<String>) -> Self {
        CoreError::AmountOverflow { what: what.into() }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs, so a failing call never touches
/// cart or order state.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (bad phone number, check-out before check-in, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidQuantity {
            item_id: "dish-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for dish-1: available 3, requested 5"
        );

        let err = CoreError::Unauthorized {
            order_id: "o-1".to_string(),
            seller_id: "s-9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Order o-1 not found or unauthorized for seller s-9"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CoreError::not_found("item", "x").kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::EmptyCart.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            CoreError::NegotiationPending {
                order_id: "o".into(),
                family: "refund"
            }
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            CoreError::PaymentDeclined {
                order_id: "o".into(),
                reason: "card declined".into()
            }
            .kind(),
            ErrorKind::ExternalFailure
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "reason".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::InvalidInput);
    }
}
