//! # mart-scan: Scan Ingestion Runtime for Mart POS
//!
//! Runs the pure scan logic from `mart-core` against real time and real
//! collaborators.
//!
//! ## Modules
//!
//! - [`config`] - `scan.toml` loading with environment overrides
//! - [`surface`] - Per-input driver tasks (debounce timer, token queue)
//! - [`pipeline`] - Dedup, resolution and cart reconciliation behind a processing guard
//! - [`resolver`] - Two-tier catalog resolver with snapshot cache
//! - [`catalog`], [`billing`], [`printer`] - Collaborator interfaces
//! - [`memory`] - In-memory collaborators for tests and the console harness
//! - [`error`] - Runtime error types
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use mart_scan::{
//!     InMemoryCatalog, RecordingPrinter, ScanConfig, ScanPipeline, SequentialBilling,
//!     SurfaceHandle,
//! };
//!
//! # async fn run() -> Result<(), mart_scan::ScanError> {
//! let config = ScanConfig::load_or_default(None);
//! let pipeline = Arc::new(ScanPipeline::new(
//!     &config,
//!     Arc::new(InMemoryCatalog::new(Vec::new())),
//!     Arc::new(SequentialBilling::new()),
//!     Arc::new(RecordingPrinter::new()),
//! ));
//!
//! let (feedback_tx, mut feedback_rx) = tokio::sync::mpsc::unbounded_channel();
//! let search = SurfaceHandle::spawn("search", pipeline.clone(), feedback_tx);
//! search.type_text("8901234567890").await?;
//!
//! if let Some(report) = feedback_rx.recv().await {
//!     println!("{}: {:?}", report.token, report.outcome);
//! }
//! # Ok(())
//! # }
//! ```

pub mod billing;
pub mod catalog;
pub mod config;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod printer;
pub mod resolver;
pub mod surface;

pub use billing::{BillRequest, BillingService};
pub use catalog::CatalogService;
pub use config::ScanConfig;
pub use error::{BillingError, CatalogError, PrintError, ScanError, ScanResult};
pub use memory::{InMemoryCatalog, RecordingPrinter, SequentialBilling};
pub use pipeline::{Notice, ScanOutcome, ScanPipeline};
pub use printer::{LabelJob, LabelPrinter};
pub use resolver::CatalogResolver;
pub use surface::{SurfaceHandle, SurfaceReport};
