//! # Validation Module
//!
//! Input validation utilities for Bazaar.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (storefront, partner app)                             │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: bazaar-core                                                  │
//! │  ├── THIS MODULE: field rules (quantities, addresses, reasons)         │
//! │  └── Pricing rules: stock, variants, non-positive prices               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK / UNIQUE constraints                             │
//! │  └── Optimistic version column                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::validation::{validate_quantity, validate_reason};
//!
//! assert!(validate_quantity(5).is_ok());
//! assert_eq!(validate_reason("reason", "  torn seam ").unwrap(), "torn seam");
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::types::{BankDetails, DeliveryAddress};
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text reason or note accepted.
pub const MAX_TEXT_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a field is present and returns it trimmed.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Validates a cancellation, refund or return reason.
///
/// ## Rules
/// - Must not be empty
/// - At most 500 characters
pub fn validate_reason(field: &str, reason: &str) -> ValidationResult<String> {
    let reason = validate_required(field, reason)?;
    if reason.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        });
    }
    Ok(reason)
}

/// Validates an optional order note. Blank notes collapse to `None`.
pub fn validate_note(note: Option<&str>) -> ValidationResult<Option<String>> {
    match note.map(str::trim) {
        None | Some("") => Ok(None),
        Some(n) if n.chars().count() > MAX_TEXT_LEN => Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_TEXT_LEN,
        }),
        Some(n) => Ok(Some(n.to_string())),
    }
}

/// Validates a phone number.
///
/// ## Rules
/// - 6 to 20 characters after trimming
/// - Digits, spaces, hyphens and an optional leading `+`
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = validate_required("phone", phone)?;
    let body = phone.strip_prefix('+').unwrap_or(&phone);

    if !body.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces and hyphens".to_string(),
        });
    }

    let digits = body.chars().filter(char::is_ascii_digit).count();
    if !(6..=20).contains(&digits) {
        return Err(ValidationError::OutOfRange {
            field: "phone digits".to_string(),
            min: 6,
            max: 20,
        });
    }

    Ok(())
}

/// Validates a delivery address.
pub fn validate_delivery_address(address: &DeliveryAddress) -> ValidationResult<()> {
    validate_required("name", &address.name)?;
    validate_phone(&address.phone)?;
    validate_required("street", &address.street)?;
    validate_required("city", &address.city)?;
    validate_required("country", &address.country)?;
    validate_required("postal_code", &address.postal_code)?;
    Ok(())
}

/// Validates refund payout details.
///
/// ## Rules
/// - Country, bank name and account holder are required
/// - Account number is 4 to 34 alphanumeric characters (covers IBAN)
pub fn validate_bank_details(bank: &BankDetails) -> ValidationResult<()> {
    validate_required("country", &bank.country)?;
    validate_required("bank_name", &bank.bank_name)?;
    validate_required("account_name", &bank.account_name)?;

    let number = validate_required("account_number", &bank.account_number)?;
    if !number.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "account_number".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }
    if !(4..=34).contains(&number.len()) {
        return Err(ValidationError::OutOfRange {
            field: "account_number length".to_string(),
            min: 4,
            max: 34,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
///
/// Stock limits are checked separately during pricing, against the live
/// catalog.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a tax or commission rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Validates the number of lines a cart would hold after an add.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Stay Validators
// =============================================================================

/// Validates the stay dates of a room line and returns them unwrapped.
///
/// ## Rules
/// - Both check-in and check-out are required
/// - Check-out must be strictly after check-in
pub fn validate_stay(
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
) -> ValidationResult<(DateTime<Utc>, DateTime<Utc>)> {
    let check_in = check_in.ok_or_else(|| ValidationError::Required {
        field: "check_in".to_string(),
    })?;
    let check_out = check_out.ok_or_else(|| ValidationError::Required {
        field: "check_out".to_string(),
    })?;

    if check_out <= check_in {
        return Err(ValidationError::InvalidFormat {
            field: "check_out".to_string(),
            reason: "must be after check_in".to_string(),
        });
    }

    Ok((check_in, check_out))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            name: "Amina Khan".to_string(),
            phone: "+92 300 1234567".to_string(),
            street: "12 Mall Road".to_string(),
            city: "Lahore".to_string(),
            state: None,
            country: "PK".to_string(),
            postal_code: "54000".to_string(),
        }
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason("reason", " too late ").unwrap(), "too late");
        assert!(validate_reason("reason", "   ").is_err());
        assert!(validate_reason("reason", &"x".repeat(501)).is_err());
    }

    #[test]
    fn test_validate_note() {
        assert_eq!(validate_note(None).unwrap(), None);
        assert_eq!(validate_note(Some("  ")).unwrap(), None);
        assert_eq!(validate_note(Some("ring twice")).unwrap().as_deref(), Some("ring twice"));
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+92 300 1234567").is_ok());
        assert!(validate_phone("0300-1234567").is_ok());
        assert!(validate_phone("12ab34").is_err());
        assert!(validate_phone("123").is_err());
    }

    #[test]
    fn test_validate_delivery_address() {
        assert!(validate_delivery_address(&address()).is_ok());

        let mut missing_city = address();
        missing_city.city = " ".to_string();
        assert!(matches!(
            validate_delivery_address(&missing_city),
            Err(ValidationError::Required { field }) if field == "city"
        ));
    }

    #[test]
    fn test_validate_bank_details() {
        let bank = BankDetails {
            country: "IN".to_string(),
            bank_name: "State Bank".to_string(),
            account_name: "R. Iyer".to_string(),
            account_number: "001234567890".to_string(),
            ifsc_code: Some("SBIN0000001".to_string()),
        };
        assert!(validate_bank_details(&bank).is_ok());

        let mut bad = bank.clone();
        bad.account_number = "12-34".to_string();
        assert!(validate_bank_details(&bad).is_err());
    }

    #[test]
    fn test_validate_rate_bps() {
        assert!(validate_rate_bps("tax_rate", 0).is_ok());
        assert!(validate_rate_bps("tax_rate", 10000).is_ok());
        assert!(validate_rate_bps("tax_rate", 10001).is_err());
    }

    #[test]
    fn test_validate_stay() {
        let check_in = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
        let check_out = Utc.with_ymd_and_hms(2026, 3, 3, 11, 0, 0).unwrap();

        assert!(validate_stay(Some(check_in), Some(check_out)).is_ok());
        assert!(validate_stay(None, Some(check_out)).is_err());
        assert!(validate_stay(Some(check_out), Some(check_in)).is_err());
        assert!(validate_stay(Some(check_in), Some(check_in)).is_err());
    }
}
