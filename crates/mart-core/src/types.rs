//! # Domain Types
//!
//! Data contracts shared between the scan path and its collaborators.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CatalogItem    │   │   BarcodeHit    │   │  ReceiptRecord  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  sku (unique)   │   │  sku            │   │  id             │       │
//! │  │  barcode?       │   │  name           │   │  sequence       │       │
//! │  │  price / cost   │   │  price          │   │  total          │       │
//! │  │  stock          │   └─────────────────┘   │  payment_method │       │
//! │  │  is_active      │    remote registry hit  └─────────────────┘       │
//! │  └─────────────────┘                          billing service result   │
//! │   catalog snapshot                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All types serialize in camelCase, which is what the UI layer and the
//! catalog service speak.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Catalog Item
// =============================================================================

/// An item as published by the catalog service. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CatalogItem {
    /// Stock Keeping Unit - unique, alphanumeric.
    pub sku: String,

    /// Numeric retail barcode, if the item has one.
    #[serde(default)]
    pub barcode: Option<String>,

    /// Display name shown to the cashier and on labels.
    pub name: String,

    /// Selling price.
    pub price: Money,

    /// Purchase cost.
    #[serde(default)]
    pub cost: Money,

    /// Units on hand (never negative).
    #[serde(default)]
    pub stock: i64,

    /// Reorder threshold.
    #[serde(default)]
    pub min_stock: i64,

    /// Inactive items resolve but cannot be sold.
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Selling unit ("pcs", "kg", ...).
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Whether `stock` is enforced at the till.
    #[serde(default = "default_true")]
    pub track_inventory: bool,
}

fn default_true() -> bool {
    true
}

fn default_unit() -> String {
    "pcs".to_string()
}

impl CatalogItem {
    /// Checks if one more unit can be sold (in stock or stock not tracked).
    pub fn can_sell(&self) -> bool {
        !self.track_inventory || self.stock > 0
    }

    /// True when tracked stock is at or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.track_inventory && self.stock <= self.min_stock
    }

    /// The value a shelf label should carry: the retail barcode when present,
    /// the SKU otherwise.
    pub fn label_value(&self) -> &str {
        match self.barcode.as_deref() {
            Some(code) if !code.trim().is_empty() => code,
            _ => &self.sku,
        }
    }
}

// =============================================================================
// Remote Registry Hit
// =============================================================================

/// What the remote barcode registry knows about a code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BarcodeHit {
    pub sku: String,
    pub name: String,
    pub price: Money,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Upi => write!(f, "upi"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            other => Err(crate::error::ValidationError::InvalidFormat {
                field: "payment method".to_string(),
                reason: format!("unknown method '{}', expected cash, card or upi", other),
            }),
        }
    }
}

// =============================================================================
// Receipt Record
// =============================================================================

/// A persisted bill as returned by the billing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReceiptRecord {
    pub id: String,
    /// Bill number assigned by the billing service.
    pub sequence: u64,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub line_count: usize,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Label Metadata
// =============================================================================

/// Human-readable text printed next to the barcode on a shelf label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LabelMetadata {
    pub item_name: String,
    pub batch_number: Option<String>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    pub price: Money,
}

impl LabelMetadata {
    /// Metadata for an item with no batch tracking.
    pub fn for_item(item: &CatalogItem) -> Self {
        LabelMetadata {
            item_name: item.name.clone(),
            batch_number: None,
            expiry_date: None,
            price: item.price,
        }
    }
}
