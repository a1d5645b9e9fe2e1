//! # Validation Module
//!
//! Input validation for catalog entries and manual cart edits.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Points                                  │
//! │                                                                         │
//! │  Catalog snapshot load                                                 │
//! │  └── validate_catalog_item: malformed entries are left out of the     │
//! │      snapshot so they can never resolve                                │
//! │                                                                         │
//! │  Manual cart edits (cashier typed a quantity or discount)              │
//! │  ├── validate_quantity                                                 │
//! │  └── validate_discount                                                 │
//! │                                                                         │
//! │  Scanner input is NOT validated here: the classifier only ever         │
//! │  emits tokens of [A-Za-z0-9-], so there is nothing left to reject.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mart_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("COKE-330").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{BarcodeHit, CatalogItem};
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use mart_core::validation::validate_sku;
///
/// assert!(validate_sku("COKE-330").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an item name (1 to 200 characters after trimming).
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a stored retail barcode: digits only, at most 14 of them.
pub fn validate_barcode(code: &str) -> ValidationResult<()> {
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    if code.len() > 14 {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: 14,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a manually entered line quantity.
///
/// ## Rules
/// - Zero or negative is allowed (it removes the line)
/// - Must not exceed MAX_LINE_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a cashier-entered discount before it is clamped.
///
/// Negative discounts are a typing mistake, not a surcharge.
pub fn validate_discount(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Checks that one more line fits in the cart.
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
// Catalog Entries
// =============================================================================

/// Validates a unit price (must be non-negative).
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a remote registry hit before it is trusted over the snapshot.
pub fn validate_barcode_hit(hit: &BarcodeHit) -> ValidationResult<()> {
    validate_sku(&hit.sku)?;
    validate_price(hit.price)
}

/// Validates a catalog entry before it joins a snapshot.
pub fn validate_catalog_item(item: &CatalogItem) -> ValidationResult<()> {
    validate_sku(&item.sku)?;
    validate_item_name(&item.name)?;

    if let Some(code) = item.barcode.as_deref() {
        if !code.trim().is_empty() {
            validate_barcode(code.trim())?;
        }
    }

    validate_price(item.price)?;

    if item.stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
