//! Fault monitor
//!
//! Single background consumer of write attempts. Workers enqueue one
//! `Attempt` per batch, in dispatch order, before the write starts; the
//! monitor then awaits each attempt's outcome in that order. It logs
//! failures and keeps counts, and never propagates anything back.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use tick_store::WriteFailure;
use tick_types::batch::BatchId;

use crate::metrics::IngestMetrics;

/// How a single write attempt ended.
#[derive(Debug)]
pub enum WriteOutcome {
    Written,
    Failed(WriteFailure),
    /// The sink panicked; the payload message if it was a string.
    Panicked(String),
}

/// One dispatched write, as announced by a worker.
#[derive(Debug)]
pub struct Attempt {
    pub batch_id: BatchId,
    pub batch_size: usize,
    pub worker: usize,
    /// Bounded sample of instrument ids in the batch.
    pub sample: Vec<String>,
    pub outcome: oneshot::Receiver<WriteOutcome>,
}

/// What the monitor observed over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    pub attempts: u64,
    pub written: u64,
    pub failed: u64,
    pub panicked: u64,
    /// Attempts whose worker vanished before reporting.
    pub lost: u64,
}

impl MonitorReport {
    pub fn unsuccessful(&self) -> u64 {
        self.failed + self.panicked + self.lost
    }
}

pub type AttemptSender = mpsc::UnboundedSender<Attempt>;

pub struct FaultMonitor {
    attempts: mpsc::UnboundedReceiver<Attempt>,
    metrics: Arc<IngestMetrics>,
    report: MonitorReport,
}

impl FaultMonitor {
    /// Create the monitor and the sender workers announce attempts on.
    pub fn channel(metrics: Arc<IngestMetrics>) -> (AttemptSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = Self {
            attempts: rx,
            metrics,
            report: MonitorReport::default(),
        };
        (tx, monitor)
    }

    /// Consume attempts until every sender is gone and the queue is empty.
    pub async fn run(mut self) -> MonitorReport {
        while let Some(attempt) = self.attempts.recv().await {
            self.observe(attempt).await;
        }

        let report = self.report;
        if report.unsuccessful() > 0 {
            warn!(
                attempts = report.attempts,
                written = report.written,
                failed = report.failed,
                panicked = report.panicked,
                lost = report.lost,
                "Fault monitor drained with failures"
            );
        } else {
            info!(attempts = report.attempts, "Fault monitor drained");
        }
        report
    }

    async fn observe(&mut self, attempt: Attempt) {
        let Attempt {
            batch_id,
            batch_size,
            worker,
            sample,
            outcome,
        } = attempt;
        self.report.attempts += 1;

        match outcome.await {
            Ok(WriteOutcome::Written) => {
                self.report.written += 1;
                self.metrics.record_written(batch_size);
                debug!(batch_id = %batch_id, batch_size, worker, "Write confirmed");
            }
            Ok(WriteOutcome::Failed(failure)) => {
                self.report.failed += 1;
                self.metrics.record_failed(batch_size);
                error!(
                    batch_id = %batch_id,
                    batch_size,
                    worker,
                    instruments = ?sample,
                    error = %failure,
                    "Batch write failed, batch discarded"
                );
            }
            Ok(WriteOutcome::Panicked(message)) => {
                self.report.panicked += 1;
                self.metrics.record_panic(batch_size);
                error!(
                    batch_id = %batch_id,
                    batch_size,
                    worker,
                    instruments = ?sample,
                    panic = %message,
                    "Sink panicked during write, batch discarded"
                );
            }
            Err(_) => {
                self.report.lost += 1;
                self.metrics.record_lost(batch_size);
                error!(
                    batch_id = %batch_id,
                    batch_size,
                    worker,
                    instruments = ?sample,
                    "Worker exited without reporting a write outcome"
                );
            }
        }
    }
}
