//! Write worker pool
//!
//! `workers` long-lived tasks share one batch queue. A worker takes the
//! queue lock only to receive a batch and announce the attempt to the
//! fault monitor, so attempts reach the monitor in dispatch order while
//! the writes themselves run concurrently.
//!
//! A sink panic is caught per write and reported as an outcome; the
//! worker carries on with the next batch.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use tick_store::StorageSink;
use tick_types::batch::Batch;

use crate::metrics::IngestMetrics;
use crate::monitor::{Attempt, AttemptSender, WriteOutcome};

type BatchQueue = Arc<Mutex<UnboundedReceiver<Batch>>>;

/// Handles of the running workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks draining `batches` into `sink`.
    pub fn spawn(
        workers: usize,
        sink: Arc<dyn StorageSink>,
        batches: UnboundedReceiver<Batch>,
        attempts: AttemptSender,
        failure_sample: usize,
        metrics: Arc<IngestMetrics>,
        parent: &Span,
    ) -> Self {
        let queue: BatchQueue = Arc::new(Mutex::new(batches));
        let handles = (0..workers)
            .map(|worker| {
                let span = info_span!(parent: parent, "worker", worker);
                tokio::spawn(
                    worker_loop(
                        worker,
                        queue.clone(),
                        sink.clone(),
                        attempts.clone(),
                        failure_sample,
                        metrics.clone(),
                    )
                    .instrument(span),
                )
            })
            .collect();

        info!(workers, sink = sink.name(), "Worker pool started");
        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to finish. Workers finish once the batch
    /// queue is closed and empty.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    queue: BatchQueue,
    sink: Arc<dyn StorageSink>,
    attempts: AttemptSender,
    failure_sample: usize,
    metrics: Arc<IngestMetrics>,
) {
    loop {
        let (batch, done) = {
            let mut batches = queue.lock().await;
            let Some(batch) = batches.recv().await else {
                break;
            };
            let (done_tx, done_rx) = oneshot::channel();
            let attempt = Attempt {
                batch_id: batch.id(),
                batch_size: batch.len(),
                worker,
                sample: batch.instrument_sample(failure_sample),
                outcome: done_rx,
            };
            if attempts.send(attempt).is_err() {
                warn!(batch_id = %batch.id(), "Fault monitor gone, outcome will not be reported");
            }
            (batch, done_tx)
        };

        let outcome = write_isolated(sink.as_ref(), &batch, &metrics).await;
        if done.send(outcome).is_err() {
            debug!(batch_id = %batch.id(), "Outcome receiver dropped");
        }
    }
    debug!(worker, "Worker drained");
}

/// One write with panics turned into an outcome.
async fn write_isolated(
    sink: &dyn StorageSink,
    batch: &Batch,
    metrics: &IngestMetrics,
) -> WriteOutcome {
    let started = Instant::now();
    let result = AssertUnwindSafe(sink.write(batch)).catch_unwind().await;
    metrics.record_write_latency(started.elapsed().as_micros() as u64);

    match result {
        Ok(Ok(())) => WriteOutcome::Written,
        Ok(Err(failure)) => WriteOutcome::Failed(failure),
        Err(payload) => WriteOutcome::Panicked(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
