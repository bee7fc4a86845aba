//! Batch accumulation
//!
//! `BatchAccumulator` is the pure buffering policy: it is handed ticks
//! and the current time and says when a batch is ready. Size and age
//! triggers are both evaluated here so the policy can be tested without
//! a runtime.
//!
//! `run` drives one accumulator from a tick channel and hands finished
//! batches to the worker queue. The handoff is an unbounded send, so the
//! accumulator never waits for a write.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use tick_types::batch::{Batch, BatchId};
use tick_types::record::Tick;

use crate::metrics::IngestMetrics;

/// Size/age triggered buffer of admitted ticks.
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: usize,
    flush_interval: Duration,
    buffer: Vec<Tick>,
    last_flush: Instant,
    next_id: u64,
}

impl BatchAccumulator {
    /// `batch_size` must be non-zero (checked by config validation).
    pub fn new(batch_size: usize, flush_interval: Duration, now: Instant) -> Self {
        Self {
            batch_size: batch_size.max(1),
            flush_interval,
            buffer: Vec::with_capacity(batch_size),
            last_flush: now,
            next_id: 0,
        }
    }

    /// Buffer a tick; returns a full batch when `batch_size` is reached.
    pub fn push(&mut self, tick: Tick, now: Instant) -> Option<Batch> {
        self.buffer.push(tick);
        if self.buffer.len() >= self.batch_size {
            self.take(now)
        } else {
            None
        }
    }

    /// When the age trigger fires next.
    pub fn deadline(&self) -> Instant {
        self.last_flush + self.flush_interval
    }

    /// Age trigger. An empty buffer only restarts the interval.
    pub fn flush_due(&mut self, now: Instant) -> Option<Batch> {
        if now < self.deadline() {
            return None;
        }
        if self.buffer.is_empty() {
            self.last_flush = now;
            return None;
        }
        self.take(now)
    }

    /// Hand off whatever is buffered. Never yields an empty batch.
    pub fn take(&mut self, now: Instant) -> Option<Batch> {
        if self.buffer.is_empty() {
            return None;
        }
        let ticks = mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        let batch = Batch::new(BatchId::new(self.next_id), ticks)?;
        self.next_id += 1;
        self.last_flush = now;
        Some(batch)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Number of batches produced so far.
    pub fn produced(&self) -> u64 {
        self.next_id
    }

    /// Drive the accumulator until the tick channel closes, then flush
    /// the remainder.
    pub async fn run(
        mut self,
        mut ticks: UnboundedReceiver<Tick>,
        batches: UnboundedSender<Batch>,
        metrics: Arc<IngestMetrics>,
    ) {
        loop {
            tokio::select! {
                biased;

                received = ticks.recv() => match received {
                    Some(tick) => {
                        if let Some(batch) = self.push(tick, Instant::now()) {
                            dispatch(&batches, batch, "size", &metrics);
                        }
                    }
                    None => break,
                },

                _ = sleep_until(self.deadline()) => {
                    if let Some(batch) = self.flush_due(Instant::now()) {
                        dispatch(&batches, batch, "interval", &metrics);
                    }
                }
            }
        }

        if let Some(batch) = self.take(Instant::now()) {
            dispatch(&batches, batch, "shutdown", &metrics);
        }
        info!(batches = self.produced(), "Accumulator stopped");
    }
}

fn dispatch(
    queue: &UnboundedSender<Batch>,
    batch: Batch,
    trigger: &'static str,
    metrics: &IngestMetrics,
) {
    let batch_id = batch.id();
    let batch_size = batch.len();
    match queue.send(batch) {
        Ok(()) => {
            metrics.record_dispatched();
            debug!(batch_id = %batch_id, batch_size, trigger, "Batch dispatched");
        }
        Err(rejected) => {
            metrics.record_lost(rejected.0.len());
            error!(batch_id = %batch_id, batch_size, "Worker queue closed, batch dropped");
        }
    }
}
