//! # Cart Module
//!
//! The in-session cart and the single reconciler allowed to mutate it.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Reconciler Operations                           │
//! │                                                                         │
//! │  Trigger                  Operation                 Cart Change        │
//! │  ───────                  ─────────                 ───────────        │
//! │                                                                         │
//! │  Accepted scan ─────────► add_or_increment() ─────► qty += 1 / push    │
//! │                                                                         │
//! │  +/- buttons ───────────► update_quantity() ──────► qty += delta       │
//! │                                                                         │
//! │  Typed quantity ────────► set_quantity() ─────────► qty = n            │
//! │                                                                         │
//! │  Click Remove ──────────► remove_line() ──────────► lines.remove(i)    │
//! │                                                                         │
//! │  Discount field ────────► set_discount() ─────────► clamp [0, sub]     │
//! │                                                                         │
//! │  Bill saved / cancel ───► clear() ────────────────► lines.clear()      │
//! │                                                                         │
//! │  NOTE: quantity ≤ 0 never survives; such a line is removed.            │
//! │        A failed operation leaves the cart exactly as it was.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reconciler also owns the deduplicator, so the "last accepted scan"
//! record lives next to the cart it protects.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::catalog::Resolved;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::scan::{Admission, Deduplicator, LastScan, ScanEvent};
use crate::validation::validate_cart_size;
use crate::{DEDUP_MS, MAX_CART_LINES, MAX_LINE_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// One line of the cart.
///
/// `name` and `unit_price` are frozen when the line is created; later scans
/// of the same SKU only bump the quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    /// Always ≥ 1.
    pub quantity: i64,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    fn from_resolved(resolved: &Resolved) -> Self {
        CartLine {
            sku: resolved.sku.clone(),
            name: resolved.name.clone(),
            unit_price: resolved.unit_price,
            quantity: 1,
            added_at: Utc::now(),
        }
    }

    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Lines in insertion order plus an absolute discount.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
    discount: Money,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, sku: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.sku == sku)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// The discount as applied to the current subtotal.
    ///
    /// Re-clamped on every read, so removing lines after setting a discount
    /// can never drive the total below zero.
    pub fn discount(&self) -> Money {
        self.discount.clamp_to(Money::zero(), self.subtotal())
    }

    pub fn total(&self) -> Money {
        let total = self.subtotal() - self.discount();
        if total.is_negative() {
            Money::zero()
        } else {
            total
        }
    }

    fn position(&self, sku: &str) -> CoreResult<usize> {
        self.lines
            .iter()
            .position(|l| l.sku == sku)
            .ok_or_else(|| CoreError::NotInCart(sku.to_string()))
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Read-only copy of the cart with derived totals, for billing and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub line_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

impl From<&Cart> for CartSnapshot {
    fn from(cart: &Cart) -> Self {
        CartSnapshot {
            lines: cart.lines.clone(),
            line_count: cart.line_count(),
            total_quantity: cart.total_quantity(),
            subtotal: cart.subtotal(),
            discount: cart.discount(),
            total: cart.total(),
        }
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Sole writer of the cart.
#[derive(Debug, Clone)]
pub struct CartReconciler {
    cart: Cart,
    dedup: Deduplicator,
}

impl CartReconciler {
    pub fn new(dedup_window: Duration) -> Self {
        CartReconciler {
            cart: Cart::new(),
            dedup: Deduplicator::new(dedup_window),
        }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot::from(&self.cart)
    }

    /// Runs the duplicate check for a completed scan.
    pub fn admit(&mut self, event: &ScanEvent) -> Admission {
        self.dedup.admit(event)
    }

    pub fn last_scan(&self) -> Option<&LastScan> {
        self.dedup.last()
    }

    /// Adds one unit of a resolved item. Returns the line's new quantity.
    ///
    /// ## Errors
    /// - `QuantityTooLarge` if the line is already at the cap
    /// - `CartTooLarge` if a new line would exceed the line cap
    pub fn add_or_increment(&mut self, resolved: &Resolved) -> CoreResult<i64> {
        if let Some(line) = self.cart.lines.iter_mut().find(|l| l.sku == resolved.sku) {
            let requested = line.quantity + 1;
            if requested > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested,
                    max: MAX_LINE_QUANTITY,
                });
            }
            line.quantity = requested;
            return Ok(requested);
        }

        validate_cart_size(self.cart.lines.len()).map_err(|_| CoreError::CartTooLarge {
            max: MAX_CART_LINES,
        })?;

        self.cart.lines.push(CartLine::from_resolved(resolved));
        Ok(1)
    }

    /// Applies a relative change. Returns the new quantity; `0` means the
    /// line was removed.
    pub fn update_quantity(&mut self, sku: &str, delta: i64) -> CoreResult<i64> {
        let idx = self.cart.position(sku)?;
        let requested = self.cart.lines[idx].quantity.saturating_add(delta);
        self.apply_quantity(idx, requested)
    }

    /// Sets an absolute quantity; `≤ 0` removes the line.
    pub fn set_quantity(&mut self, sku: &str, quantity: i64) -> CoreResult<i64> {
        let idx = self.cart.position(sku)?;
        self.apply_quantity(idx, quantity)
    }

    /// Removes a line. Returns whether one was there.
    pub fn remove_line(&mut self, sku: &str) -> bool {
        let before = self.cart.lines.len();
        self.cart.lines.retain(|l| l.sku != sku);
        self.cart.lines.len() != before
    }

    /// Sets the absolute discount, clamped to `[0, subtotal]`. Returns the
    /// amount applied.
    pub fn set_discount(&mut self, amount: Money) -> Money {
        self.cart.discount = amount.clamp_to(Money::zero(), self.cart.subtotal());
        self.cart.discount
    }

    /// Empties the cart and resets the discount.
    pub fn clear(&mut self) {
        self.cart = Cart::new();
    }

    fn apply_quantity(&mut self, idx: usize, requested: i64) -> CoreResult<i64> {
        if requested > MAX_LINE_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested,
                max: MAX_LINE_QUANTITY,
            });
        }
        if requested <= 0 {
            self.cart.lines.remove(idx);
            return Ok(0);
        }
        self.cart.lines[idx].quantity = requested;
        Ok(requested)
    }
}

impl Default for CartReconciler {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEDUP_MS))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
