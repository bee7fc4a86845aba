//! Pipeline orchestration
//!
//! ```text
//! Feed ──pull──▶ Validator ──▶ Accumulator ──batch queue──▶ Workers ──▶ StorageSink
//!                                                              │
//!                                                   attempts (dispatch order)
//!                                                              ▼
//!                                                        FaultMonitor
//! ```
//!
//! The main loop only pulls, validates and forwards; it never waits on
//! storage. Shutdown (token cancelled or feed exhausted) runs in order:
//! stop intake, flush the accumulator, let workers drain the queue and
//! finish in-flight writes, then drain the monitor.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument, Span};

use tick_store::{InfluxSink, StorageSink};
use tick_types::batch::Batch;
use tick_types::record::Tick;

use crate::accumulator::BatchAccumulator;
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::feed::{Feed, Pull};
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::monitor::{FaultMonitor, MonitorReport};
use crate::pool::WorkerPool;
use crate::validator::Validator;

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub metrics: MetricsSnapshot,
    pub monitor: MonitorReport,
}

pub struct Pipeline {
    config: IngestConfig,
    validator: Validator,
    sink: Arc<dyn StorageSink>,
    metrics: Arc<IngestMetrics>,
    span: Span,
}

impl Pipeline {
    /// Provision InfluxDB storage and build a pipeline writing to it.
    ///
    /// Fails without side effects on the feed if provisioning fails.
    pub async fn connect(config: IngestConfig) -> Result<Self, IngestError> {
        config.validate()?;
        let sink = InfluxSink::initialize(&config.storage).await?;
        Self::with_sink(config, Arc::new(sink))
    }

    /// Build a pipeline around an already usable sink.
    pub fn with_sink(config: IngestConfig, sink: Arc<dyn StorageSink>) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self {
            validator: Validator::new(config.utc_offset_secs),
            config,
            sink,
            metrics: Arc::new(IngestMetrics::new()),
            span: info_span!("tick_ingest"),
        })
    }

    /// Parent span for everything the pipeline logs.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Live counters, shared with the running stages.
    pub fn metrics(&self) -> Arc<IngestMetrics> {
        self.metrics.clone()
    }

    /// Run until the feed is exhausted or `shutdown` is cancelled.
    pub async fn run<F: Feed>(self, feed: F, shutdown: CancellationToken) -> RunSummary {
        let span = self.span.clone();
        self.run_inner(feed, shutdown).instrument(span).await
    }

    async fn run_inner<F: Feed>(self, mut feed: F, shutdown: CancellationToken) -> RunSummary {
        let Pipeline {
            config,
            validator,
            sink,
            metrics,
            span,
        } = self;

        info!(
            workers = config.workers,
            batch_size = config.batch_size,
            flush_interval_ms = config.flush_interval_ms,
            sink = sink.name(),
            "Pipeline starting"
        );

        let (tick_tx, tick_rx) = mpsc::unbounded_channel::<Tick>();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel::<Batch>();
        let (attempt_tx, monitor) = FaultMonitor::channel(metrics.clone());

        let monitor_task =
            tokio::spawn(monitor.run().instrument(info_span!(parent: &span, "fault_monitor")));

        let pool = WorkerPool::spawn(
            config.workers,
            sink,
            batch_rx,
            attempt_tx,
            config.failure_sample,
            metrics.clone(),
            &span,
        );

        let accumulator =
            BatchAccumulator::new(config.batch_size, config.flush_interval(), Instant::now());
        let accumulator_task = tokio::spawn(
            accumulator
                .run(tick_rx, batch_tx, metrics.clone())
                .instrument(info_span!(parent: &span, "accumulator")),
        );

        loop {
            let pulled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                pulled = feed.pull() => pulled,
            };

            match pulled {
                Pull::Record(raw) => {
                    metrics.record_received();
                    let tick = match validator.admit(raw) {
                        Ok(tick) => tick,
                        Err(reason) => {
                            // Already logged by the validator.
                            metrics.record_rejected(&reason);
                            continue;
                        }
                    };
                    metrics.record_admitted();
                    if let Err(rejected) = tick_tx.send(tick) {
                        metrics.record_lost(1);
                        error!(instrument_id = %rejected.0.instrument_id, "Accumulator gone, stopping intake");
                        break;
                    }
                }
                Pull::Idle => debug!("Feed idle"),
                Pull::Exhausted => {
                    info!("Feed exhausted");
                    break;
                }
            }
        }

        // Closing the tick channel flushes the accumulator, which in turn
        // closes the batch queue once its last batch is enqueued.
        drop(tick_tx);
        if let Err(e) = accumulator_task.await {
            error!(error = %e, "Accumulator task ended abnormally");
        }
        pool.join().await;
        let monitor = match monitor_task.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Fault monitor task ended abnormally");
                MonitorReport::default()
            }
        };

        let summary = RunSummary {
            metrics: metrics.snapshot(),
            monitor,
        };
        info!(
            received = summary.metrics.records_received,
            admitted = summary.metrics.records_admitted,
            rejected = summary.metrics.records_rejected,
            batches = summary.metrics.batches_dispatched,
            written = summary.monitor.written,
            failed = summary.monitor.unsuccessful(),
            "Pipeline stopped"
        );
        summary
    }
}
