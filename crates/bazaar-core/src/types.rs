//! # Shared Domain Types
//!
//! Small value types used across carts, orders and negotiations.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shared Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Rate       │   │      Owner      │   │  PaymentMethod  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  User(id)       │   │  CashOnDelivery │       │
//! │  │  500 = 5%       │   │  Guest(session) │   │  Online         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ DeliveryAddress │   │   BankDetails   │   │    Decision     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  name, phone    │   │  account holder │   │  Accept         │       │
//! │  │  street, city   │   │  account number │   │  Reject         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Rate
// =============================================================================

/// A percentage rate in basis points (bps). Used for tax and commission.
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 500 bps = 5%, 1000 bps = 10%
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a whole percentage (5 → 5%).
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        Rate(pct * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Owner
// =============================================================================

/// Who a cart (and later an order) belongs to.
///
/// Signed-in users and anonymous guest sessions each get exactly one cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
#[ts(export)]
pub enum Owner {
    User(String),
    Guest(String),
}

impl Owner {
    pub fn user(id: impl Into<String>) -> Self {
        Owner::User(id.into())
    }

    pub fn guest(session: impl Into<String>) -> Self {
        Owner::Guest(session.into())
    }

    /// Storage discriminator ("user" / "guest").
    pub fn kind(&self) -> &'static str {
        match self {
            Owner::User(_) => "user",
            Owner::Guest(_) => "guest",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Owner::User(id) | Owner::Guest(id) => id,
        }
    }

    /// Rebuilds an owner from its storage columns.
    pub fn from_parts(kind: &str, id: impl Into<String>) -> Option<Self> {
        match kind {
            "user" => Some(Owner::User(id.into())),
            "guest" => Some(Owner::Guest(id.into())),
            _ => None,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

// =============================================================================
// Delivery Address
// =============================================================================

/// Where food and product orders are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryAddress {
    /// Recipient name.
    pub name: String,
    /// Contact phone for the courier.
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub postal_code: String,
}

// =============================================================================
// Bank Details
// =============================================================================

/// Account a refund is paid out to. Frozen into the ledger when a refund is
/// requested and again when it is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BankDetails {
    pub country: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    /// Branch routing code where the country uses one (IFSC, sort code, ...).
    pub ifsc_code: Option<String>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid to the courier or at check-in; no gateway call.
    CashOnDelivery,
    /// Charged through the payment gateway when the order is created.
    Online,
}

impl PaymentMethod {
    #[inline]
    pub const fn is_online(&self) -> bool {
        matches!(self, PaymentMethod::Online)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Online => "online",
        }
    }
}

// =============================================================================
// Decision
// =============================================================================

/// A seller's answer to a pending request (order, refund, return/exchange).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    #[inline]
    pub const fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_from_percent() {
        assert_eq!(Rate::from_percent(5).bps(), 500);
        assert_eq!(Rate::from_percent(10), Rate::from_bps(1000));
        assert!((Rate::from_bps(825).percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate::from_bps(500).to_string(), "5.00%");
        assert_eq!(Rate::from_bps(825).to_string(), "8.25%");
    }

    #[test]
    fn test_owner_parts_round_trip() {
        let owner = Owner::guest("sess-42");
        assert_eq!(owner.kind(), "guest");
        assert_eq!(Owner::from_parts(owner.kind(), owner.id()), Some(owner));
        assert_eq!(Owner::from_parts("robot", "x"), None);
    }

    #[test]
    fn test_owner_wire_format() {
        let json = serde_json::to_string(&Owner::user("u-1")).unwrap();
        assert_eq!(json, r#"{"kind":"user","id":"u-1"}"#);
    }

    #[test]
    fn test_payment_method_online() {
        assert!(PaymentMethod::Online.is_online());
        assert!(!PaymentMethod::CashOnDelivery.is_online());
        assert_eq!(PaymentMethod::CashOnDelivery.as_str(), "cash_on_delivery");
    }
}
