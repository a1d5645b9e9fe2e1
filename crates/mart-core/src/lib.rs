//! # mart-core: Pure Decision Logic for Mart POS
//!
//! This crate holds the point-of-sale scan path as pure, synchronous code:
//! classify keystrokes into scan tokens, suppress duplicate echoes, match
//! tokens against a catalog snapshot, reconcile the cart, and encode
//! printable barcodes.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mart POS Scan Path                               │
//! │                                                                         │
//! │  keystrokes ──► scan::ScanClassifier ──► token                          │
//! │                                            │                            │
//! │                                            ▼                            │
//! │                     cart::CartReconciler::admit (dedup window)          │
//! │                                            │                            │
//! │                                            ▼                            │
//! │          mart-scan resolver (remote) ──► catalog::CatalogSnapshot       │
//! │                                            │                            │
//! │                                            ▼                            │
//! │                     cart::CartReconciler::add_or_increment              │
//! │                                                                         │
//! │  on demand:  CatalogItem ──► barcode::LabelSpec (EAN-13 / CODE128)      │
//! │                                                                         │
//! │   NO I/O • NO CLOCK READS FOR DECISIONS • PURE FUNCTIONS               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`scan`] - Scan classifier state machine and deduplicator
//! - [`cart`] - Cart, cart lines and the reconciler that mutates them
//! - [`catalog`] - Catalog snapshot matching and purchasability checks
//! - [`barcode`] - EAN-13 checksum, normalization and symbology selection
//! - [`money`] - Integer money type
//! - [`types`] - Catalog and billing data contracts
//! - [`validation`] - Input validation helpers
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use mart_core::barcode::normalize_ean13;
//!
//! assert_eq!(normalize_ean13("123456789012").unwrap(), "1234567890128");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod barcode;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod scan;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use barcode::{LabelSpec, Symbology};
pub use cart::{Cart, CartLine, CartReconciler, CartSnapshot};
pub use catalog::{CatalogSnapshot, ResolveFailure, Resolved, Tier};
pub use error::{CoreError, CoreResult, EncodingError, ValidationError};
pub use money::Money;
pub use scan::{
    Admission, Deduplicator, InputEvent, InputOutcome, ScanClassifier, ScanEvent, ScanTiming,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Quiet interval after the last keystroke before a candidate buffer is
/// treated as a completed scan.
pub const QUIET_MS: u64 = 300;

/// Window in which an identical token is treated as an echo of the previous
/// accepted scan rather than a second unit.
pub const DEDUP_MS: u64 = 1000;

/// Minimum buffer length for a scan candidate.
pub const MIN_TOKEN_LEN: usize = 6;

/// Maximum distinct lines in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Longest literal accepted for the CODE128 fallback on a printed label.
pub const MAX_CODE128_LEN: usize = 48;
