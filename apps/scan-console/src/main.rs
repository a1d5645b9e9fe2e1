//! # Mart POS Scan Console
//!
//! A terminal stand-in for the till's search box. Every stdin line is typed
//! into a scan surface as one keyboard-wedge burst followed by Enter, so the
//! full classify → dedup → resolve → cart path runs exactly as it does at
//! the till.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging, to stderr)
//! 2. Load scan.toml (defaults on failure)
//! 3. Load the JSON catalog snapshot (first argument or `MART_CATALOG_PATH`)
//! 4. Build the pipeline with in-memory collaborators
//! 5. Spawn the "console" surface and a feedback printer
//! 6. Read stdin until EOF or `:quit`
//!
//! ## Usage
//! ```text
//! RUST_LOG=debug scan-console demos/catalog.json
//! ```

mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mart_core::{CartSnapshot, CatalogItem, InputEvent};
use mart_scan::{
    InMemoryCatalog, RecordingPrinter, ScanConfig, ScanPipeline, ScanResult, SequentialBilling,
    SurfaceHandle, SurfaceReport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commands::{Command, HELP};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!("Starting Mart POS scan console");

    let config = ScanConfig::load_or_default(None);

    let items = match catalog_path() {
        Some(path) => load_catalog(&path)?,
        None => {
            warn!("No catalog given (argument or MART_CATALOG_PATH), starting empty");
            Vec::new()
        }
    };

    let catalog = Arc::new(InMemoryCatalog::new(items.clone()));
    register_barcodes(&catalog, &items);

    let pipeline = Arc::new(ScanPipeline::new(
        &config,
        catalog,
        Arc::new(SequentialBilling::new()),
        Arc::new(RecordingPrinter::new()),
    ));

    let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
    let surface = SurfaceHandle::spawn("console", pipeline.clone(), feedback_tx);
    let reporter = tokio::spawn(print_reports(feedback_rx));

    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => {
                if let Err(e) = run_command(command, &pipeline, &surface).await {
                    println!("  ! {}", e);
                }
            }
            Err(e) => println!("  ! {}", e),
        }
    }

    surface.shutdown().await;
    let _ = reporter.await;

    info!("Scan console stopped");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=mart_scan=trace` - Include classifier noise
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mart=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn catalog_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MART_CATALOG_PATH").ok())
        .map(PathBuf::from)
}

fn load_catalog(path: &Path) -> ScanResult<Vec<CatalogItem>> {
    let contents = std::fs::read_to_string(path)?;
    let items: Vec<CatalogItem> = serde_json::from_str(&contents)?;
    info!(?path, items = items.len(), "Catalog file loaded");
    Ok(items)
}

/// Makes every stored barcode resolvable through the remote tier too.
fn register_barcodes(catalog: &InMemoryCatalog, items: &[CatalogItem]) {
    for item in items {
        if let Some(code) = item.barcode.as_deref().filter(|c| !c.trim().is_empty()) {
            catalog.register(
                code.trim(),
                mart_core::BarcodeHit {
                    sku: item.sku.clone(),
                    name: item.name.clone(),
                    price: item.price,
                },
            );
        }
    }
}

async fn run_command(
    command: Command,
    pipeline: &ScanPipeline,
    surface: &SurfaceHandle,
) -> ScanResult<()> {
    match command {
        Command::Scan(text) => {
            surface.type_text(&text).await?;
            surface.send(InputEvent::Enter).await?;
        }
        Command::SetQuantity { sku, quantity } => {
            pipeline.set_quantity(&sku, quantity)?;
            print_cart(&pipeline.cart());
        }
        Command::Adjust { sku, delta } => {
            pipeline.update_quantity(&sku, delta)?;
            print_cart(&pipeline.cart());
        }
        Command::Remove(sku) => {
            if !pipeline.remove_line(&sku) {
                println!("  {} is not in the cart", sku);
            }
            print_cart(&pipeline.cart());
        }
        Command::Discount(amount) => {
            let applied = pipeline.set_discount(amount);
            if applied != amount {
                println!("  discount limited to {}", applied);
            }
            print_cart(&pipeline.cart());
        }
        Command::Pay(method) => {
            let receipt = pipeline.checkout(method).await?;
            println!(
                "  Bill #{} saved: {} lines, total {} ({})",
                receipt.sequence, receipt.line_count, receipt.total, receipt.payment_method
            );
        }
        Command::Label { sku, copies } => {
            let spec = pipeline.print_label_for_sku(&sku, copies).await?;
            let flag = if spec.invalid { "  [INVALID]" } else { "" };
            println!(
                "  Label {} {} x{}{}",
                spec.symbology, spec.barcode_value, copies, flag
            );
        }
        Command::Cart => print_cart(&pipeline.cart()),
        Command::Clear => pipeline.clear_cart(),
        Command::Reload => {
            let snapshot = pipeline.resolver().refresh().await?;
            match snapshot.fetched_at() {
                Some(at) => println!(
                    "  Catalog snapshot: {} items (fetched {})",
                    snapshot.len(),
                    at.format("%H:%M:%S")
                ),
                None => println!("  Catalog snapshot: {} items", snapshot.len()),
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

async fn print_reports(mut feedback: mpsc::UnboundedReceiver<SurfaceReport>) {
    while let Some(report) = feedback.recv().await {
        match report.outcome.notice() {
            Some(notice) if notice.blocking => println!("  !! {}", notice.message),
            Some(notice) => println!("  ! {}", notice.message),
            None if report.outcome.is_added() => println!("  + {}", report.token),
            None => {}
        }
    }
}

fn print_cart(cart: &CartSnapshot) {
    if cart.lines.is_empty() {
        println!("  (cart is empty)");
        return;
    }
    for line in &cart.lines {
        println!(
            "  {:<12} {:<28} {:>4} x {:>8} = {:>9}",
            line.sku,
            line.name,
            line.quantity,
            line.unit_price,
            line.line_total()
        );
    }
    println!("  {:>58} {:>9}", "Subtotal", cart.subtotal);
    if cart.discount.is_positive() {
        println!("  {:>58} {:>9}", "Discount", cart.discount);
    }
    println!("  {:>58} {:>9}", "Total", cart.total);
}
