//! # Scan Runtime Error Types
//!
//! Errors raised by the runtime and its collaborators.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Scan Runtime Error Categories                       │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Collaborators  │  │     Domain (core)       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Catalog        │  │  Cart (CoreError)       │ │
//! │  │  ConfigLoad     │  │  Billing        │  │  Encoding               │ │
//! │  │                 │  │  Print          │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Scan-path failures (not found, inactive, duplicate, ...) are NOT      │
//! │  errors: they come back as a ScanOutcome with a user notice.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use mart_core::{CoreError, EncodingError};
use thiserror::Error;

/// Result type alias for runtime operations.
pub type ScanResult<T> = Result<T, ScanError>;

// =============================================================================
// Collaborator Errors
// =============================================================================

/// Failure talking to the catalog service.
///
/// Never fatal on the scan path: the resolver falls back to the snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Network or protocol failure.
    #[error("Catalog transport error: {0}")]
    Transport(String),

    /// The call did not finish within the configured bound.
    #[error("Catalog call timed out after {ms} ms")]
    Timeout { ms: u64 },

    /// The service answered but cannot serve requests right now.
    #[error("Catalog service unavailable: {0}")]
    Unavailable(String),
}

/// Failure submitting a bill.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// The billing service refused the bill.
    #[error("Bill rejected: {0}")]
    Rejected(String),

    /// The bill could not be delivered.
    #[error("Billing transport error: {0}")]
    Transport(String),
}

/// Failure handing a label to the printer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrintError {
    #[error("Label printer offline: {0}")]
    Offline(String),

    #[error("Label job rejected: {0}")]
    Rejected(String),
}

// =============================================================================
// Runtime Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ScanError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid scan configuration.
    #[error("Invalid scan configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load a config or catalog file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A cart rule was violated; the cart is unchanged.
    #[error(transparent)]
    Cart(#[from] CoreError),

    /// The label value has no printable symbology.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Print(#[from] PrintError),

    /// No catalog entry for a SKU named outside the scan path.
    #[error("Unknown SKU: {0}")]
    UnknownSku(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// The surface driver has stopped.
    #[error("Scan surface is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        ScanError::ConfigLoadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ScanError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// Cart and encoding errors are deterministic; a rejected bill or label
    /// job needs a change before it can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScanError::Catalog(_)
                | ScanError::Billing(BillingError::Transport(_))
                | ScanError::Print(PrintError::Offline(_))
        )
    }
}
