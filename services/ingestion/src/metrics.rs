//! Ingestion metrics
//!
//! Counters are shared by every stage of a pipeline through an `Arc`
//! and updated with relaxed atomics; they are observability only and
//! never drive control flow. `snapshot` / `export` give plain copies.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::validator::Rejected;

/// Core metrics of one pipeline.
pub struct IngestMetrics {
    // Intake
    pub records_received: AtomicU64,
    pub records_admitted: AtomicU64,

    // Rejections by reason
    pub rejected_update_time: AtomicU64,
    pub rejected_action_day: AtomicU64,
    pub rejected_instrument_id: AtomicU64,
    pub rejected_decode: AtomicU64,
    pub rejected_non_finite: AtomicU64,
    pub rejected_timestamp: AtomicU64,

    // Batches
    pub batches_dispatched: AtomicU64,
    pub batches_written: AtomicU64,
    pub batches_failed: AtomicU64,
    pub worker_panics: AtomicU64,

    // Records past the accumulator
    pub records_written: AtomicU64,
    pub records_lost: AtomicU64,

    pub write_latency_us: Mutex<LatencyTracker>,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_admitted: AtomicU64::new(0),
            rejected_update_time: AtomicU64::new(0),
            rejected_action_day: AtomicU64::new(0),
            rejected_instrument_id: AtomicU64::new(0),
            rejected_decode: AtomicU64::new(0),
            rejected_non_finite: AtomicU64::new(0),
            rejected_timestamp: AtomicU64::new(0),
            batches_dispatched: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            worker_panics: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            records_lost: AtomicU64::new(0),
            write_latency_us: Mutex::new(LatencyTracker::new(1000)),
        }
    }

    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admitted(&self) {
        self.records_admitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a rejection under its reason.
    pub fn record_rejected(&self, reason: &Rejected) {
        let counter = match reason {
            Rejected::BadUpdateTime { .. } => &self.rejected_update_time,
            Rejected::BadActionDay { .. } => &self.rejected_action_day,
            Rejected::BadInstrumentId { .. } => &self.rejected_instrument_id,
            Rejected::DecodeFailure { .. } => &self.rejected_decode,
            Rejected::NonFinite { .. } => &self.rejected_non_finite,
            Rejected::BadTimestamp(_) => &self.rejected_timestamp,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self, records: usize) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self, records: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.records_lost.fetch_add(records as u64, Ordering::Relaxed);
    }

    /// A write that panicked; its records are lost like a failed write.
    pub fn record_panic(&self, records: usize) {
        self.worker_panics.fetch_add(1, Ordering::Relaxed);
        self.record_failed(records);
    }

    /// Records dropped without a write attempt (e.g. queue closed).
    pub fn record_lost(&self, records: usize) {
        self.records_lost.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_write_latency(&self, latency_us: u64) {
        if let Ok(mut tracker) = self.write_latency_us.lock() {
            tracker.record(latency_us);
        }
    }

    pub fn records_rejected(&self) -> u64 {
        [
            &self.rejected_update_time,
            &self.rejected_action_day,
            &self.rejected_instrument_id,
            &self.rejected_decode,
            &self.rejected_non_finite,
            &self.rejected_timestamp,
        ]
        .iter()
        .map(|c| c.load(Ordering::Relaxed))
        .sum()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (p50, p99) = match self.write_latency_us.lock() {
            Ok(tracker) => (tracker.percentile(50), tracker.percentile(99)),
            Err(_) => (None, None),
        };
        MetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_admitted: self.records_admitted.load(Ordering::Relaxed),
            records_rejected: self.records_rejected(),
            rejected_update_time: self.rejected_update_time.load(Ordering::Relaxed),
            rejected_action_day: self.rejected_action_day.load(Ordering::Relaxed),
            rejected_instrument_id: self.rejected_instrument_id.load(Ordering::Relaxed),
            rejected_decode: self.rejected_decode.load(Ordering::Relaxed),
            rejected_non_finite: self.rejected_non_finite.load(Ordering::Relaxed),
            rejected_timestamp: self.rejected_timestamp.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            worker_panics: self.worker_panics.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_lost: self.records_lost.load(Ordering::Relaxed),
            write_latency_p50_us: p50,
            write_latency_p99_us: p99,
        }
    }

    /// Export counters as a flat map for Prometheus-style exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let s = self.snapshot();
        let mut m = BTreeMap::new();
        m.insert("records_received".to_string(), s.records_received);
        m.insert("records_admitted".to_string(), s.records_admitted);
        m.insert("records_rejected".to_string(), s.records_rejected);
        m.insert("batches_dispatched".to_string(), s.batches_dispatched);
        m.insert("batches_written".to_string(), s.batches_written);
        m.insert("batches_failed".to_string(), s.batches_failed);
        m.insert("worker_panics".to_string(), s.worker_panics);
        m.insert("records_written".to_string(), s.records_written);
        m.insert("records_lost".to_string(), s.records_lost);
        m
    }
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of `IngestMetrics`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub records_admitted: u64,
    pub records_rejected: u64,
    pub rejected_update_time: u64,
    pub rejected_action_day: u64,
    pub rejected_instrument_id: u64,
    pub rejected_decode: u64,
    pub rejected_non_finite: u64,
    pub rejected_timestamp: u64,
    pub batches_dispatched: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
    pub worker_panics: u64,
    pub records_written: u64,
    pub records_lost: u64,
    pub write_latency_p50_us: Option<u64>,
    pub write_latency_p99_us: Option<u64>,
}

/// Sliding window of latency samples.
pub struct LatencyTracker {
    samples: Vec<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.remove(0);
        }
        self.samples.push(value);
    }

    /// Percentile value (0-100) over the window.
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let idx = (p as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}
