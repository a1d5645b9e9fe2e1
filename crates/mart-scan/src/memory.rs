//! In-memory collaborators.
//!
//! Used by the console harness and as test doubles. Each one can be told to
//! fail so the soft-failure paths can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mart_core::{BarcodeHit, CatalogItem, ReceiptRecord};
use tracing::debug;
use uuid::Uuid;

use crate::billing::{BillRequest, BillingService};
use crate::catalog::CatalogService;
use crate::error::{BillingError, CatalogError, PrintError};
use crate::printer::{LabelJob, LabelPrinter};

// =============================================================================
// Catalog
// =============================================================================

/// A catalog service backed by a `Vec` and a code → hit registry.
#[derive(Default)]
pub struct InMemoryCatalog {
    items: Mutex<Vec<CatalogItem>>,
    registry: Mutex<HashMap<String, BarcodeHit>>,
    remote_delay: Mutex<Option<Duration>>,
    fail_remote: AtomicBool,
    fail_snapshot: AtomicBool,
    remote_calls: AtomicUsize,
    snapshot_calls: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        InMemoryCatalog {
            items: Mutex::new(items),
            ..Default::default()
        }
    }

    /// Adds a remote registry entry.
    pub fn register(&self, code: &str, hit: BarcodeHit) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code.to_string(), hit);
    }

    pub fn set_items(&self, items: Vec<CatalogItem>) {
        *self.items.lock().unwrap_or_else(PoisonError::into_inner) = items;
    }

    pub fn set_remote_failure(&self, fail: bool) {
        self.fail_remote.store(fail, Ordering::SeqCst);
    }

    pub fn set_snapshot_failure(&self, fail: bool) {
        self.fail_snapshot.store(fail, Ordering::SeqCst);
    }

    /// Delays every registry lookup, to simulate a slow network.
    pub fn set_remote_delay(&self, delay: Option<Duration>) {
        *self.remote_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn resolve_barcode(&self, code: &str) -> Result<Option<BarcodeHit>, CatalogError> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.remote_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_remote.load(Ordering::SeqCst) {
            return Err(CatalogError::Transport("simulated outage".to_string()));
        }

        Ok(self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .cloned())
    }

    async fn list_catalog_snapshot(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_snapshot.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("simulated outage".to_string()));
        }

        Ok(self.items.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

// =============================================================================
// Billing
// =============================================================================

/// Assigns consecutive bill numbers and remembers every receipt.
///
/// Resubmitting a request id returns the original receipt.
pub struct SequentialBilling {
    next_sequence: AtomicU64,
    receipts: Mutex<Vec<(Uuid, BillRequest, ReceiptRecord)>>,
    fail: AtomicBool,
}

impl SequentialBilling {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(sequence: u64) -> Self {
        SequentialBilling {
            next_sequence: AtomicU64::new(sequence),
            receipts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_failure(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn receipts(&self) -> Vec<ReceiptRecord> {
        self.receipts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, _, receipt)| receipt.clone())
            .collect()
    }

    pub fn submitted(&self) -> Vec<BillRequest> {
        self.receipts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, bill, _)| bill.clone())
            .collect()
    }
}

impl Default for SequentialBilling {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BillingService for SequentialBilling {
    async fn submit_bill(&self, bill: &BillRequest) -> Result<ReceiptRecord, BillingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BillingError::Transport("simulated outage".to_string()));
        }

        let mut receipts = self.receipts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, _, receipt)) = receipts.iter().find(|(id, _, _)| *id == bill.request_id) {
            debug!(request_id = %bill.request_id, "Duplicate bill submission, returning original receipt");
            return Ok(receipt.clone());
        }

        let receipt = ReceiptRecord {
            id: Uuid::new_v4().to_string(),
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            subtotal: bill.cart.subtotal,
            discount: bill.discount,
            total: bill.cart.total,
            payment_method: bill.payment_method,
            line_count: bill.cart.line_count,
            created_at: Utc::now(),
        };
        receipts.push((bill.request_id, bill.clone(), receipt.clone()));

        Ok(receipt)
    }
}

// =============================================================================
// Label Printer
// =============================================================================

/// Records every job it is handed.
#[derive(Default)]
pub struct RecordingPrinter {
    jobs: Mutex<Vec<LabelJob>>,
    offline: AtomicBool,
}

impl RecordingPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn jobs(&self) -> Vec<LabelJob> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl LabelPrinter for RecordingPrinter {
    async fn print(&self, job: &LabelJob) -> Result<(), PrintError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PrintError::Offline("simulated printer offline".to_string()));
        }
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mart_core::{CartSnapshot, Money, PaymentMethod};

    fn cart() -> CartSnapshot {
        CartSnapshot {
            lines: Vec::new(),
            line_count: 1,
            total_quantity: 2,
            subtotal: Money::from_cents(2000),
            discount: Money::from_cents(100),
            total: Money::from_cents(1900),
        }
    }

    #[tokio::test]
    async fn test_billing_sequence_and_idempotency() {
        let billing = SequentialBilling::starting_at(41);
        let first = BillRequest::new(cart(), PaymentMethod::Cash);
        let second = BillRequest::new(cart(), PaymentMethod::Upi);

        let r1 = billing.submit_bill(&first).await.unwrap();
        let again = billing.submit_bill(&first).await.unwrap();
        let r2 = billing.submit_bill(&second).await.unwrap();

        assert_eq!(r1.sequence, 41);
        assert_eq!(again, r1);
        assert_eq!(r2.sequence, 42);
        assert_eq!(r1.total.cents(), 1900);
        assert_eq!(billing.receipts().len(), 2);
    }

    #[tokio::test]
    async fn test_billing_failure() {
        let billing = SequentialBilling::new();
        billing.set_failure(true);
        let result = billing
            .submit_bill(&BillRequest::new(cart(), PaymentMethod::Card))
            .await;
        assert!(matches!(result, Err(BillingError::Transport(_))));
        assert!(billing.receipts().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_registry() {
        let catalog = InMemoryCatalog::new(Vec::new());
        catalog.register(
            "8901234567890",
            BarcodeHit {
                sku: "MILK-1L".to_string(),
                name: "Milk".to_string(),
                price: Money::from_cents(6200),
            },
        );

        assert!(catalog.resolve_barcode("8901234567890").await.unwrap().is_some());
        assert!(catalog.resolve_barcode("0000000000000").await.unwrap().is_none());
        assert_eq!(catalog.remote_calls(), 2);
    }
}
