//! # Validation Module
//!
//! Input validation run before business logic or persistence.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Wire (serde)                                                 │
//! │  └── Shape and type checks on deserialization                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Field rules (positive quantities, prices, rates, sizes)           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK constraints (stock ≥ 0, totals arithmetic)                  │
//! │  ├── Partial UNIQUE indexes (order number, default tax)                │
//! │  └── Append-only ledger triggers                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::TaxRate;
use crate::{MAX_ITEM_QUANTITY, MAX_SALE_LINES, MAX_STOCK_LEVEL, MAX_UNIT_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a free-text reason (void, refund). Required, at most 500 chars.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    if reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }
    if reason.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 500,
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
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Unit prices are strictly positive and at most [`MAX_UNIT_PRICE_CENTS`].
///
/// ```rust
/// use harbor_core::validation::validate_unit_price;
///
/// assert!(validate_unit_price(1_800_000).is_ok());
/// assert!(validate_unit_price(0).is_err());
/// assert!(validate_unit_price(i64::MAX / 2).is_err());
/// ```
pub fn validate_unit_price(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "unit price".to_string(),
        });
    }

    if cents > MAX_UNIT_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "unit price".to_string(),
            min: 1,
            max: MAX_UNIT_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a tendered amount. Zero is allowed for fully discounted sales.
pub fn validate_tendered_amount(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "tendered amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Tax rule rates are fractions in `[0, 1)`, i.e. below 10000 bps.
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps >= TaxRate::BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: "tax rate".to_string(),
            min: 0,
            max: (TaxRate::BPS_SCALE - 1) as i64,
        });
    }

    Ok(())
}

/// Stock, minimum and reserved levels lie in `[0, MAX_STOCK_LEVEL]`.
pub fn validate_stock_level(field: &str, value: i64) -> ValidationResult<()> {
    if !(0..=MAX_STOCK_LEVEL).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK_LEVEL,
        });
    }

    Ok(())
}

/// A manual stock movement is non-zero and at most `MAX_STOCK_LEVEL` either way.
pub fn validate_movement_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity == 0 || quantity.unsigned_abs() > MAX_STOCK_LEVEL as u64 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -MAX_STOCK_LEVEL,
            max: MAX_STOCK_LEVEL,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on one sale.
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "sale lines".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason("customer changed mind").is_ok());
        assert!(validate_reason(" ").is_err());
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
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(1100).is_ok());
        assert!(validate_tax_rate_bps(9999).is_ok());
        assert!(validate_tax_rate_bps(10_000).is_err());
    }

    #[test]
    fn test_validate_amounts_and_levels() {
        assert!(validate_tendered_amount(0).is_ok());
        assert!(validate_tendered_amount(-1).is_err());
        assert!(validate_stock_level("stock", 0).is_ok());
        assert!(validate_stock_level("stock", -3).is_err());
        assert!(validate_stock_level("stock", MAX_STOCK_LEVEL + 1).is_err());
        assert!(validate_unit_price(MAX_UNIT_PRICE_CENTS).is_ok());
        assert!(validate_unit_price(MAX_UNIT_PRICE_CENTS + 1).is_err());
    }

    #[test]
    fn test_validate_movement_quantity() {
        assert!(validate_movement_quantity(-5).is_ok());
        assert!(validate_movement_quantity(MAX_STOCK_LEVEL).is_ok());
        assert!(validate_movement_quantity(0).is_err());
        assert!(validate_movement_quantity(i64::MIN).is_err());
        assert!(validate_movement_quantity(i64::MAX).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(100).is_ok());
        assert!(validate_line_count(101).is_err());
    }
}
