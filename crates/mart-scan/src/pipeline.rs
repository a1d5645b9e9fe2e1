//! # Scan Pipeline
//!
//! Takes completed scan events through dedup, resolution and the cart, and
//! hosts the session operations that touch the same cart (manual edits,
//! checkout, label printing).
//!
//! ## Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ScanPipeline::process                             │
//! │                                                                         │
//! │  ScanEvent                                                             │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  processing guard (FIFO async mutex, shared by every surface)          │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  reconciler.admit ──── Duplicate ──────────────► Duplicate             │
//! │     │ Accepted                                                          │
//! │     ▼                                                                   │
//! │  resolver.resolve(token).await ── failure ─────► Unresolved            │
//! │     │ Resolved                                                          │
//! │     ▼                                                                   │
//! │  reconciler.add_or_increment ──── cap hit ─────► Rejected              │
//! │     │                                                                   │
//! │     └──────────────────────────────────────────► Added                 │
//! │                                                                         │
//! │  The cart lock is only ever held for a synchronous call, never across  │
//! │  an await.                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use mart_core::{
    Admission, CartReconciler, CartSnapshot, CatalogItem, CoreError, EncodingError,
    LabelMetadata, LabelSpec, Money, PaymentMethod, ReceiptRecord, ResolveFailure, ScanEvent,
    ScanTiming,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::billing::{BillRequest, BillingService};
use crate::catalog::CatalogService;
use crate::config::ScanConfig;
use crate::error::{ScanError, ScanResult};
use crate::printer::{LabelJob, LabelPrinter};
use crate::resolver::CatalogResolver;

// =============================================================================
// Outcomes
// =============================================================================

/// What happened to one scan event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// One unit added; `quantity` is the line's new quantity.
    Added {
        sku: String,
        quantity: i64,
        low_stock: bool,
    },
    /// Echo of the previous scan, dropped.
    Duplicate,
    /// Not found, inactive or out of stock.
    Unresolved(ResolveFailure),
    /// Resolved, but a cart cap refused it.
    Rejected(CoreError),
}

/// A message for the cashier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    /// Must be acknowledged before scanning continues.
    pub blocking: bool,
}

impl ScanOutcome {
    /// The notice to show, if any. Duplicates and plain adds are silent.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            ScanOutcome::Added {
                sku,
                low_stock: true,
                ..
            } => Some(Notice {
                message: format!("Low stock: {}", sku),
                blocking: false,
            }),
            ScanOutcome::Added { .. } | ScanOutcome::Duplicate => None,
            ScanOutcome::Unresolved(failure) => Some(Notice {
                message: failure.to_string(),
                blocking: matches!(failure, ResolveFailure::NotFound { .. }),
            }),
            ScanOutcome::Rejected(err) => Some(Notice {
                message: err.to_string(),
                blocking: false,
            }),
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, ScanOutcome::Added { .. })
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// The per-session scan pipeline. Share it between surfaces with `Arc`.
pub struct ScanPipeline {
    timing: ScanTiming,
    max_code128_len: usize,
    resolver: CatalogResolver,
    billing: Arc<dyn BillingService>,
    printer: Arc<dyn LabelPrinter>,
    reconciler: Mutex<CartReconciler>,
    processing: AsyncMutex<()>,
}

impl ScanPipeline {
    pub fn new(
        config: &ScanConfig,
        catalog: Arc<dyn CatalogService>,
        billing: Arc<dyn BillingService>,
        printer: Arc<dyn LabelPrinter>,
    ) -> Self {
        let timing = config.scan_timing();
        ScanPipeline {
            timing,
            max_code128_len: config.labels.max_code128_len,
            resolver: CatalogResolver::new(catalog, &config.resolver),
            billing,
            printer,
            reconciler: Mutex::new(CartReconciler::new(timing.dedup_window)),
            processing: AsyncMutex::new(()),
        }
    }

    pub fn timing(&self) -> ScanTiming {
        self.timing
    }

    pub fn resolver(&self) -> &CatalogResolver {
        &self.resolver
    }

    /// Runs one scan event to completion.
    ///
    /// Events are processed one at a time in the order they reach the guard.
    pub async fn process(&self, event: ScanEvent) -> ScanOutcome {
        let _processing = self.processing.lock().await;

        if let Admission::Duplicate { since } = self.with_reconciler(|r| r.admit(&event)) {
            debug!(token = %event.token, since_ms = since.as_millis() as u64, "Duplicate scan suppressed");
            return ScanOutcome::Duplicate;
        }

        let resolved = match self.resolver.resolve(&event.token).await {
            Ok(resolved) => resolved,
            Err(failure) => {
                info!(token = %event.token, reason = %failure, "Scan not added");
                return ScanOutcome::Unresolved(failure);
            }
        };

        match self.with_reconciler(|r| r.add_or_increment(&resolved)) {
            Ok(quantity) => {
                debug!(
                    sku = %resolved.sku,
                    quantity = quantity,
                    tier = ?resolved.tier,
                    "Cart line updated from scan"
                );
                ScanOutcome::Added {
                    sku: resolved.sku,
                    quantity,
                    low_stock: resolved.low_stock,
                }
            }
            Err(e) => {
                info!(sku = %resolved.sku, error = %e, "Scan refused by cart");
                ScanOutcome::Rejected(e)
            }
        }
    }

    // =========================================================================
    // Cart Operations
    // =========================================================================

    /// Executes a function with the reconciler locked.
    pub fn with_reconciler<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut CartReconciler) -> R,
    {
        let mut reconciler = self.reconciler.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut reconciler)
    }

    pub fn cart(&self) -> CartSnapshot {
        self.with_reconciler(|r| r.snapshot())
    }

    pub fn update_quantity(&self, sku: &str, delta: i64) -> ScanResult<i64> {
        let quantity = self.with_reconciler(|r| r.update_quantity(sku, delta))?;
        debug!(sku = %sku, delta = delta, quantity = quantity, "Quantity adjusted");
        Ok(quantity)
    }

    pub fn set_quantity(&self, sku: &str, quantity: i64) -> ScanResult<i64> {
        let quantity = self.with_reconciler(|r| r.set_quantity(sku, quantity))?;
        debug!(sku = %sku, quantity = quantity, "Quantity set");
        Ok(quantity)
    }

    pub fn remove_line(&self, sku: &str) -> bool {
        let removed = self.with_reconciler(|r| r.remove_line(sku));
        debug!(sku = %sku, removed = removed, "Line removed");
        removed
    }

    /// Returns the discount actually applied.
    pub fn set_discount(&self, amount: Money) -> Money {
        let applied = self.with_reconciler(|r| r.set_discount(amount));
        debug!(requested = %amount, applied = %applied, "Discount set");
        applied
    }

    pub fn clear_cart(&self) {
        self.with_reconciler(|r| r.clear());
        info!("Cart cleared");
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Submits the cart as a bill and clears it on success.
    ///
    /// Holds the processing guard, so scans arriving meanwhile wait and land
    /// in the next cart. On failure the cart is kept as it was.
    pub async fn checkout(&self, payment_method: PaymentMethod) -> ScanResult<ReceiptRecord> {
        let _processing = self.processing.lock().await;

        let cart = self.cart();
        if cart.lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let bill = BillRequest::new(cart, payment_method);
        let receipt = match self.billing.submit_bill(&bill).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(request_id = %bill.request_id, error = %e, "Bill submission failed, cart kept");
                return Err(e.into());
            }
        };

        self.with_reconciler(|r| r.clear());
        info!(
            sequence = receipt.sequence,
            total = %receipt.total,
            payment_method = %receipt.payment_method,
            "Bill saved"
        );
        Ok(receipt)
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// Encodes the label for an item without printing it.
    pub fn preview_label(&self, item: &CatalogItem) -> Result<LabelSpec, EncodingError> {
        LabelSpec::for_item(item, self.max_code128_len)
    }

    /// Encodes and prints a label.
    ///
    /// An `invalid` spec is still printed (as a placeholder) and returned so
    /// the caller can flag it.
    pub async fn print_label(
        &self,
        item: &CatalogItem,
        metadata: LabelMetadata,
        copies: u32,
    ) -> ScanResult<LabelSpec> {
        let spec = match self.preview_label(item) {
            Ok(spec) => spec,
            Err(e) => {
                info!(sku = %item.sku, error = %e, "Label value cannot be encoded");
                return Err(e.into());
            }
        };

        if spec.invalid {
            warn!(
                sku = %spec.sku,
                value = %spec.barcode_value,
                symbology = %spec.symbology,
                "Label value rejected by symbology, printing placeholder"
            );
        }

        let job = LabelJob {
            spec: spec.clone(),
            metadata,
            copies,
        };
        self.printer.print(&job).await?;

        debug!(sku = %spec.sku, symbology = %spec.symbology, copies = copies, "Label sent to printer");
        Ok(spec)
    }

    /// Prints a label for a SKU from the local snapshot.
    pub async fn print_label_for_sku(&self, sku: &str, copies: u32) -> ScanResult<LabelSpec> {
        let snapshot = self.resolver.snapshot().await;
        let item = snapshot
            .find_by_sku(sku)
            .ok_or_else(|| ScanError::UnknownSku(sku.to_string()))?;

        self.print_label(item, LabelMetadata::for_item(item), copies)
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryCatalog, RecordingPrinter, SequentialBilling};
    use mart_core::{BarcodeHit, Symbology, MAX_LINE_QUANTITY};
    use std::time::{Duration, Instant};

    struct Harness {
        pipeline: ScanPipeline,
        catalog: Arc<InMemoryCatalog>,
        billing: Arc<SequentialBilling>,
        printer: Arc<RecordingPrinter>,
    }

    fn item(sku: &str, barcode: Option<&str>, stock: i64) -> CatalogItem {
        CatalogItem {
            sku: sku.to_string(),
            barcode: barcode.map(str::to_string),
            name: format!("Item {}", sku),
            price: Money::from_cents(1000),
            cost: Money::zero(),
            stock,
            min_stock: 1,
            is_active: true,
            unit: "pcs".to_string(),
            track_inventory: true,
        }
    }

    fn harness(items: Vec<CatalogItem>) -> Harness {
        let catalog = Arc::new(InMemoryCatalog::new(items));
        let billing = Arc::new(SequentialBilling::new());
        let printer = Arc::new(RecordingPrinter::new());
        let pipeline = ScanPipeline::new(
            &ScanConfig::default(),
            catalog.clone(),
            billing.clone(),
            printer.clone(),
        );
        Harness {
            pipeline,
            catalog,
            billing,
            printer,
        }
    }

    fn scan(token: &str, at: Instant) -> ScanEvent {
        ScanEvent {
            token: token.to_string(),
            arrived_at: at,
        }
    }

    #[tokio::test]
    async fn test_duplicate_then_rescan() {
        let h = harness(vec![item("ABC123", None, 10)]);
        let t0 = Instant::now();

        assert!(h.pipeline.process(scan("ABC123", t0)).await.is_added());
        assert_eq!(
            h.pipeline
                .process(scan("ABC123", t0 + Duration::from_millis(900)))
                .await,
            ScanOutcome::Duplicate
        );
        assert_eq!(h.pipeline.cart().lines[0].quantity, 1);

        let outcome = h
            .pipeline
            .process(scan("ABC123", t0 + Duration::from_millis(1000)))
            .await;
        assert_eq!(
            outcome,
            ScanOutcome::Added {
                sku: "ABC123".to_string(),
                quantity: 2,
                low_stock: false
            }
        );
        assert!(outcome.notice().is_none());
    }

    #[tokio::test]
    async fn test_not_found_is_blocking_notice() {
        let h = harness(vec![item("ABC123", None, 10)]);

        let outcome = h.pipeline.process(scan("ZZZ999", Instant::now())).await;
        let notice = outcome.notice().unwrap();
        assert!(notice.blocking);
        assert!(notice.message.contains("ZZZ999"));
        assert!(h.pipeline.cart().lines.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_stock_and_inactive_leave_cart_unchanged() {
        let mut inactive = item("OLD-001", None, 10);
        inactive.is_active = false;
        let h = harness(vec![item("EMPTY-1", None, 0), inactive, item("ABC123", None, 5)]);
        let t0 = Instant::now();

        h.pipeline.process(scan("ABC123", t0)).await;
        let before = h.pipeline.cart();

        let outcome = h.pipeline.process(scan("EMPTY-1", t0)).await;
        assert!(matches!(
            outcome,
            ScanOutcome::Unresolved(ResolveFailure::OutOfStock { .. })
        ));
        assert!(!outcome.notice().unwrap().blocking);

        let outcome = h.pipeline.process(scan("OLD-001", t0)).await;
        assert!(matches!(
            outcome,
            ScanOutcome::Unresolved(ResolveFailure::Inactive { .. })
        ));
        assert_eq!(h.pipeline.cart(), before);
    }

    #[tokio::test]
    async fn test_low_stock_notice() {
        let h = harness(vec![item("LAST-1", None, 1)]);

        let outcome = h.pipeline.process(scan("LAST-1", Instant::now())).await;
        let notice = outcome.notice().unwrap();
        assert!(!notice.blocking);
        assert!(notice.message.contains("LAST-1"));
    }

    #[tokio::test]
    async fn test_remote_outage_still_adds() {
        let h = harness(vec![item("ABC123", None, 10)]);
        h.catalog.set_remote_failure(true);

        assert!(h.pipeline.process(scan("ABC123", Instant::now())).await.is_added());
    }

    #[tokio::test]
    async fn test_quantity_cap_rejected() {
        let h = harness(vec![item("ABC123", None, 5000)]);
        let t0 = Instant::now();

        h.pipeline.process(scan("ABC123", t0)).await;
        h.pipeline.set_quantity("ABC123", MAX_LINE_QUANTITY).unwrap();

        let outcome = h
            .pipeline
            .process(scan("ABC123", t0 + Duration::from_secs(2)))
            .await;
        assert!(matches!(
            outcome,
            ScanOutcome::Rejected(CoreError::QuantityTooLarge { .. })
        ));
        assert_eq!(h.pipeline.cart().lines[0].quantity, MAX_LINE_QUANTITY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_keeps_arrival_order() {
        let h = harness(vec![item("FIRST-1", None, 5), item("SECOND-1", None, 5)]);
        h.catalog.set_remote_delay(Some(Duration::from_millis(200)));
        let t0 = Instant::now();

        let (a, b) = tokio::join!(
            h.pipeline.process(scan("FIRST-1", t0)),
            h.pipeline.process(scan("SECOND-1", t0 + Duration::from_millis(10)))
        );
        assert!(a.is_added() && b.is_added());

        let cart = h.pipeline.cart();
        assert_eq!(cart.lines[0].sku, "FIRST-1");
        assert_eq!(cart.lines[1].sku, "SECOND-1");
    }

    #[tokio::test]
    async fn test_checkout_clears_on_success() {
        let h = harness(vec![item("ABC123", None, 10)]);
        h.pipeline.process(scan("ABC123", Instant::now())).await;
        h.pipeline.set_discount(Money::from_cents(250));

        let receipt = h.pipeline.checkout(PaymentMethod::Card).await.unwrap();
        assert_eq!(receipt.sequence, 1);
        assert_eq!(receipt.total.cents(), 750);
        assert_eq!(receipt.discount.cents(), 250);
        assert!(h.pipeline.cart().lines.is_empty());
        assert_eq!(h.billing.submitted()[0].cart.lines[0].sku, "ABC123");
    }

    #[tokio::test]
    async fn test_checkout_failure_keeps_cart() {
        let h = harness(vec![item("ABC123", None, 10)]);
        h.pipeline.process(scan("ABC123", Instant::now())).await;
        h.billing.set_failure(true);

        let err = h.pipeline.checkout(PaymentMethod::Cash).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(h.pipeline.cart().lines.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let h = harness(Vec::new());
        let err = h.pipeline.checkout(PaymentMethod::Cash).await.unwrap_err();
        assert!(matches!(err, ScanError::Cart(CoreError::EmptyCart)));
        assert!(h.billing.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_manual_edits() {
        let h = harness(vec![item("ABC123", None, 10)]);
        h.pipeline.process(scan("ABC123", Instant::now())).await;

        assert_eq!(h.pipeline.update_quantity("ABC123", 3).unwrap(), 4);
        assert_eq!(h.pipeline.update_quantity("ABC123", -4).unwrap(), 0);
        assert!(h.pipeline.cart().lines.is_empty());
        assert!(matches!(
            h.pipeline.set_quantity("ABC123", 2),
            Err(ScanError::Cart(CoreError::NotInCart(_)))
        ));
        assert!(!h.pipeline.remove_line("ABC123"));
    }

    #[tokio::test]
    async fn test_print_label_for_sku() {
        let h = harness(vec![item("LOOSE-01", Some("12345"), 3), item("RICE-5KG", None, 3)]);

        let spec = h.pipeline.print_label_for_sku("LOOSE-01", 2).await.unwrap();
        assert_eq!(spec.symbology, Symbology::Ean13);
        assert_eq!(spec.barcode_value, "0000000123457");

        let spec = h.pipeline.print_label_for_sku("RICE-5KG", 1).await.unwrap();
        assert_eq!(spec.symbology, Symbology::Code128);

        let jobs = h.printer.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].copies, 2);
        assert_eq!(jobs[0].metadata.item_name, "Item LOOSE-01");

        assert!(matches!(
            h.pipeline.print_label_for_sku("NOPE-1", 1).await,
            Err(ScanError::UnknownSku(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_label_still_printed() {
        let h = harness(Vec::new());
        let bad = item("BAD-EAN", Some("1234567890123"), 1);

        let spec = h
            .pipeline
            .print_label(&bad, LabelMetadata::for_item(&bad), 1)
            .await
            .unwrap();
        assert!(spec.invalid);
        assert!(h.printer.jobs()[0].spec.invalid);
    }

    #[tokio::test]
    async fn test_unencodable_label_not_printed() {
        let h = harness(Vec::new());
        let too_long = item("LONG-1", Some(&"1".repeat(60)), 1);

        let err = h
            .pipeline
            .print_label(&too_long, LabelMetadata::for_item(&too_long), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Encoding(EncodingError::TooLong { .. })));
        assert!(h.printer.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_printer_offline() {
        let h = harness(Vec::new());
        h.printer.set_offline(true);
        let ok_item = item("ABC123", None, 1);

        let err = h
            .pipeline
            .print_label(&ok_item, LabelMetadata::for_item(&ok_item), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Print(_)));
    }

    #[tokio::test]
    async fn test_remote_hit_price_used() {
        let h = harness(vec![item("MILK-1L", Some("8901234567890"), 10)]);
        h.catalog.register(
            "8901234567890",
            BarcodeHit {
                sku: "MILK-1L".to_string(),
                name: "Milk 1L".to_string(),
                price: Money::from_cents(6200),
            },
        );

        h.pipeline.process(scan("8901234567890", Instant::now())).await;
        assert_eq!(h.pipeline.cart().subtotal.cents(), 6200);
    }
}
