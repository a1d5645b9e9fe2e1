//! # Input Surfaces
//!
//! One driver per UI text input. The driver owns that surface's classifier
//! and arms its completion deadline; completed tokens go to a per-surface
//! FIFO queue drained by a single worker into the shared pipeline.
//!
//! ## Task Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UI input ──► mpsc ──► driver task                                      │
//! │                        select! {                                        │
//! │                          next InputEvent  ──► classifier.handle()       │
//! │                          sleep_until(deadline) ──► classifier.poll()    │
//! │                        }                                                │
//! │                            │ ScanEvent                                  │
//! │                            ▼                                            │
//! │                        token queue (FIFO)                               │
//! │                            │                                            │
//! │                            ▼                                            │
//! │                        worker task ──► pipeline.process().await         │
//! │                            │                                            │
//! │                            ▼                                            │
//! │                        feedback channel ──► SurfaceReport               │
//! │                                                                         │
//! │  A token completed while an earlier one is still resolving waits in    │
//! │  the queue; nothing is dropped.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use mart_core::{InputEvent, InputOutcome, ScanClassifier, ScanEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{ScanError, ScanResult};
use crate::pipeline::{ScanOutcome, ScanPipeline};

/// Input events buffered per surface before senders wait.
const INPUT_BUFFER: usize = 256;

/// The result of one token from one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceReport {
    pub surface: String,
    pub token: String,
    pub outcome: ScanOutcome,
}

/// Handle to a running surface.
///
/// Calling [`shutdown`] stops the driver. Tokens already queued are still
/// processed, and a buffered candidate completes after its quiet interval.
///
/// [`shutdown`]: SurfaceHandle::shutdown
pub struct SurfaceHandle {
    name: String,
    input: mpsc::Sender<InputEvent>,
    driver: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl SurfaceHandle {
    /// Starts the driver and worker tasks for a surface.
    pub fn spawn(
        name: impl Into<String>,
        pipeline: Arc<ScanPipeline>,
        feedback: mpsc::UnboundedSender<SurfaceReport>,
    ) -> Self {
        let name = name.into();
        let (input_tx, input_rx) = mpsc::channel(INPUT_BUFFER);
        let (token_tx, token_rx) = mpsc::unbounded_channel();

        let classifier = ScanClassifier::new(pipeline.timing());
        let driver = tokio::spawn(drive(name.clone(), classifier, input_rx, token_tx));
        let worker = tokio::spawn(work(name.clone(), pipeline, token_rx, feedback));

        debug!(surface = %name, "Scan surface started");
        SurfaceHandle {
            name,
            input: input_tx,
            driver,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn send(&self, event: InputEvent) -> ScanResult<()> {
        self.input
            .send(event)
            .await
            .map_err(|_| ScanError::ShuttingDown)
    }

    /// Sends `text` as individual keystrokes.
    pub async fn type_text(&self, text: &str) -> ScanResult<()> {
        for c in text.chars() {
            self.send(InputEvent::Key(c)).await?;
        }
        Ok(())
    }

    /// Stops the surface and waits for queued tokens to finish processing.
    pub async fn shutdown(self) {
        drop(self.input);
        let _ = self.driver.await;
        let _ = self.worker.await;
        debug!(surface = %self.name, "Scan surface stopped");
    }
}

async fn drive(
    surface: String,
    mut classifier: ScanClassifier,
    mut input: mpsc::Receiver<InputEvent>,
    tokens: mpsc::UnboundedSender<ScanEvent>,
) {
    loop {
        let deadline = classifier.deadline();

        let completed = tokio::select! {
            event = input.recv() => {
                let Some(event) = event else {
                    flush(&surface, &mut classifier, &tokens).await;
                    break;
                };
                match classifier.handle(event, Instant::now().into_std()) {
                    InputOutcome::Completed(scan) => Some(scan),
                    InputOutcome::Noise => {
                        trace!(surface = %surface, "Input noise, buffer reset");
                        None
                    }
                    InputOutcome::Buffering { .. } | InputOutcome::Cleared => None,
                }
            }
            _ = wait_until(deadline) => classifier.poll(Instant::now().into_std()),
        };

        if let Some(scan) = completed {
            debug!(surface = %surface, token = %scan.token, "Scan completed");
            if tokens.send(scan).is_err() {
                break;
            }
        }
    }
}

/// Completes a pending candidate at its quiet deadline after input closes.
async fn flush(
    surface: &str,
    classifier: &mut ScanClassifier,
    tokens: &mpsc::UnboundedSender<ScanEvent>,
) {
    let Some(deadline) = classifier.deadline() else {
        return;
    };
    wait_until(Some(deadline)).await;
    if let Some(scan) = classifier.poll(Instant::now().into_std()) {
        debug!(surface = %surface, token = %scan.token, "Scan completed on shutdown");
        let _ = tokens.send(scan);
    }
}

async fn work(
    surface: String,
    pipeline: Arc<ScanPipeline>,
    mut tokens: mpsc::UnboundedReceiver<ScanEvent>,
    feedback: mpsc::UnboundedSender<SurfaceReport>,
) {
    while let Some(scan) = tokens.recv().await {
        let token = scan.token.clone();
        let outcome = pipeline.process(scan).await;

        let report = SurfaceReport {
            surface: surface.clone(),
            token,
            outcome,
        };
        // The UI may have gone away; keep draining so the cart stays consistent.
        let _ = feedback.send(report);
    }
}

async fn wait_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
