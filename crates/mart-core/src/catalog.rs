//! # Catalog Matching
//!
//! The pure half of the two-tier resolver: matching a scanned token against
//! a catalog snapshot, and deciding whether a matched item may be sold.
//!
//! ## Lookup Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  token ──► Tier 1: remote registry (mart-scan)                         │
//! │              │ hit ──► enrich from snapshot by sku ──► check_sellable  │
//! │              │ miss / error / timeout                                  │
//! │              ▼                                                          │
//! │            Tier 2: CatalogSnapshot::lookup                             │
//! │              1. barcode or sku, case-insensitive, first match wins     │
//! │              2. numeric token vs numeric barcodes, both EAN-13         │
//! │                 normalized (stored 12345 scans back as 0000000123457)  │
//! │              │                                                          │
//! │              ▼                                                          │
//! │            check_sellable ──► Resolved | ResolveFailure                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::barcode::normalize_ean13;
use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{BarcodeHit, CatalogItem};
use crate::validation::validate_catalog_item;

// =============================================================================
// Resolution Results
// =============================================================================

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Tier {
    Remote,
    Local,
}

/// A token resolved to a purchasable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Resolved {
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub tier: Tier,
    /// Tracked stock is at or below the reorder threshold.
    pub low_stock: bool,
}

/// Why a token did not become a cart line.
///
/// These are user notices, not faults; the cart is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveFailure {
    #[error("No item found for '{token}'")]
    NotFound { token: String },

    #[error("{name} ({sku}) is inactive and cannot be sold")]
    Inactive { sku: String, name: String },

    #[error("{name} ({sku}) is out of stock")]
    OutOfStock { sku: String, name: String },
}

/// Decides whether `item` may be added to a cart.
pub fn check_sellable(item: &CatalogItem) -> Result<(), ResolveFailure> {
    if !item.is_active {
        return Err(ResolveFailure::Inactive {
            sku: item.sku.clone(),
            name: item.name.clone(),
        });
    }
    if !item.can_sell() {
        return Err(ResolveFailure::OutOfStock {
            sku: item.sku.clone(),
            name: item.name.clone(),
        });
    }
    Ok(())
}

// =============================================================================
// Snapshot
// =============================================================================

/// An entry left out of a snapshot because it failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedItem {
    pub sku: String,
    pub error: ValidationError,
}

/// A point-in-time copy of the catalog, used as the local fallback tier.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    items: Vec<CatalogItem>,
    fetched_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    /// Wraps items as-is, keeping their order.
    pub fn new(items: Vec<CatalogItem>) -> Self {
        CatalogSnapshot {
            items,
            fetched_at: None,
        }
    }

    /// Builds a snapshot from the valid entries and reports the rest.
    pub fn from_validated(items: Vec<CatalogItem>) -> (Self, Vec<RejectedItem>) {
        let mut kept = Vec::with_capacity(items.len());
        let mut rejected = Vec::new();

        for item in items {
            match validate_catalog_item(&item) {
                Ok(()) => kept.push(item),
                Err(error) => rejected.push(RejectedItem {
                    sku: item.sku,
                    error,
                }),
            }
        }

        (Self::new(kept), rejected)
    }

    pub fn with_fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(at);
        self
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find_by_sku(&self, sku: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|i| i.sku.eq_ignore_ascii_case(sku))
    }

    /// Finds the item a scanned token refers to.
    pub fn lookup(&self, token: &str) -> Option<&CatalogItem> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        let exact = self.items.iter().find(|item| {
            let barcode_match = item
                .barcode
                .as_deref()
                .map(str::trim)
                .is_some_and(|code| !code.is_empty() && code.eq_ignore_ascii_case(token));
            barcode_match || item.sku.eq_ignore_ascii_case(token)
        });
        if exact.is_some() {
            return exact;
        }

        let wanted = normalize_ean13(token).ok()?;
        self.items.iter().find(|item| {
            item.barcode
                .as_deref()
                .and_then(|code| normalize_ean13(code.trim()).ok())
                .is_some_and(|code| code == wanted)
        })
    }

    /// Tier 2: token to a sellable item.
    pub fn resolve_local(&self, token: &str) -> Result<Resolved, ResolveFailure> {
        let item = self.lookup(token).ok_or_else(|| ResolveFailure::NotFound {
            token: token.to_string(),
        })?;
        check_sellable(item)?;

        Ok(Resolved {
            sku: item.sku.clone(),
            name: item.name.clone(),
            unit_price: item.price,
            tier: Tier::Local,
            low_stock: item.is_low_stock(),
        })
    }

    /// Tier 1 follow-up: validates a registry hit against the snapshot.
    ///
    /// The registry's name and price win. A SKU the snapshot does not know
    /// is treated as active with untracked stock.
    pub fn resolve_remote(&self, hit: &BarcodeHit) -> Result<Resolved, ResolveFailure> {
        let low_stock = match self.find_by_sku(&hit.sku) {
            Some(item) => {
                check_sellable(item)?;
                item.is_low_stock()
            }
            None => false,
        };

        Ok(Resolved {
            sku: hit.sku.clone(),
            name: hit.name.clone(),
            unit_price: hit.price,
            tier: Tier::Remote,
            low_stock,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: &str, barcode: Option<&str>, stock: i64) -> CatalogItem {
        CatalogItem {
            sku: sku.to_string(),
            barcode: barcode.map(str::to_string),
            name: format!("Item {}", sku),
            price: Money::from_cents(1000),
            cost: Money::from_cents(700),
            stock,
            min_stock: 2,
            is_active: true,
            unit: "pcs".to_string(),
            track_inventory: true,
        }
    }

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new(vec![
            item("ABC123", None, 10),
            item("MILK-1L", Some("8901234567890"), 5),
            item("LOOSE-01", Some("12345"), 1),
            item("EMPTY-01", Some("4006381333931"), 0),
        ])
    }

    #[test]
    fn test_lookup_by_sku_case_insensitive() {
        let snap = snapshot();
        assert_eq!(snap.lookup("abc123").unwrap().sku, "ABC123");
        assert_eq!(snap.lookup("milk-1l").unwrap().sku, "MILK-1L");
    }

    #[test]
    fn test_lookup_by_barcode() {
        let snap = snapshot();
        assert_eq!(snap.lookup("8901234567890").unwrap().sku, "MILK-1L");
        assert!(snap.lookup("0000000000000").is_none());
        assert!(snap.lookup("").is_none());
    }

    #[test]
    fn test_lookup_first_match_wins() {
        let snap = CatalogSnapshot::new(vec![
            item("FIRST-1", Some("555555"), 3),
            item("SECOND-1", Some("555555"), 3),
        ]);
        assert_eq!(snap.lookup("555555").unwrap().sku, "FIRST-1");
    }

    #[test]
    fn test_lookup_normalized_label_scans_back() {
        let snap = snapshot();
        assert_eq!(snap.lookup("0000000123457").unwrap().sku, "LOOSE-01");
        // 14-digit read of the same payload
        assert_eq!(snap.lookup("00000001234570").unwrap().sku, "LOOSE-01");
    }

    #[test]
    fn test_resolve_local_checks_sellable() {
        let snap = snapshot();

        let resolved = snap.resolve_local("ABC123").unwrap();
        assert_eq!(resolved.tier, Tier::Local);
        assert_eq!(resolved.unit_price.cents(), 1000);
        assert!(!resolved.low_stock);

        assert!(snap.resolve_local("12345").unwrap().low_stock);

        assert!(matches!(
            snap.resolve_local("4006381333931"),
            Err(ResolveFailure::OutOfStock { ref sku, .. }) if sku == "EMPTY-01"
        ));
        assert_eq!(
            snap.resolve_local("ZZZ999"),
            Err(ResolveFailure::NotFound {
                token: "ZZZ999".to_string()
            })
        );
    }

    #[test]
    fn test_inactive_and_untracked() {
        let mut inactive = item("OLD-001", None, 50);
        inactive.is_active = false;
        let mut untracked = item("BAG-001", None, 0);
        untracked.track_inventory = false;
        let snap = CatalogSnapshot::new(vec![inactive, untracked]);

        assert!(matches!(
            snap.resolve_local("OLD-001"),
            Err(ResolveFailure::Inactive { .. })
        ));
        assert_eq!(snap.resolve_local("BAG-001").unwrap().sku, "BAG-001");
    }

    #[test]
    fn test_resolve_remote_enriches_from_snapshot() {
        let snap = snapshot();
        let hit = |sku: &str| BarcodeHit {
            sku: sku.to_string(),
            name: "Registry Name".to_string(),
            price: Money::from_cents(1250),
        };

        let resolved = snap.resolve_remote(&hit("MILK-1L")).unwrap();
        assert_eq!(resolved.tier, Tier::Remote);
        assert_eq!(resolved.name, "Registry Name");
        assert_eq!(resolved.unit_price.cents(), 1250);

        assert!(matches!(
            snap.resolve_remote(&hit("EMPTY-01")),
            Err(ResolveFailure::OutOfStock { .. })
        ));

        let unknown = snap.resolve_remote(&hit("NEW-777")).unwrap();
        assert_eq!(unknown.sku, "NEW-777");
        assert!(!unknown.low_stock);
    }

    #[test]
    fn test_from_validated_reports_rejects() {
        let mut bad = item("BAD SKU", None, 1);
        bad.name = "Bad".to_string();
        let (snap, rejected) = CatalogSnapshot::from_validated(vec![item("GOOD-1", None, 1), bad]);

        assert_eq!(snap.len(), 1);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].sku, "BAD SKU");
    }
}
