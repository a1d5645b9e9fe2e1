//! # Error Types
//!
//! Domain-specific error types for mart-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mart-core errors (this file)                                          │
//! │  ├── CoreError        - Cart rule violations                           │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  ├── NormalizeError   - Numeric code cannot become an EAN-13           │
//! │  └── EncodingError    - Value has no safe symbology at all             │
//! │                                                                         │
//! │  mart-scan errors (separate crate)                                     │
//! │  └── ScanError        - Collaborator and configuration failures        │
//! │                                                                         │
//! │  Not errors: input noise and duplicate scans are ordinary outcomes     │
//! │  (scan::InputOutcome / scan::Admission) and are never surfaced.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Cart and billing rule violations.
///
/// Every operation that returns one of these leaves the cart exactly as it
/// was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The SKU has no line in the cart.
    #[error("Item {0} is not in the cart")]
    NotInCart(String),

    /// Adding a new line would exceed the line cap.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// The resulting line quantity would exceed the cap.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
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

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Barcode Errors
// =============================================================================

/// A string that cannot be normalized into a 13-digit EAN code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("barcode is empty")]
    Empty,

    #[error("'{0}' contains a non-digit character")]
    NonDigit(String),

    #[error("numeric code of length {0} is longer than 14 digits")]
    TooLong(usize),
}

/// A label value that fits neither EAN-13 nor the CODE128 fallback.
///
/// Shown as an inline, non-blocking notice on the label widget.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("nothing to encode")]
    Empty,

    #[error("'{value}' contains characters no barcode symbology can print")]
    UnprintableCharacters { value: String },

    #[error("value of length {len} exceeds the CODE128 label limit of {max}")]
    TooLong { len: usize, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
