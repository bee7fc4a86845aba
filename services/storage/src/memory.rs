//! In-process sinks
//!
//! `MemorySink` keeps every written batch and is what the pipeline tests
//! run against. `LogSink` prints each point in line protocol, for dry
//! runs without a backend.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use tick_types::batch::Batch;

use crate::error::WriteFailure;
use crate::point::Point;
use crate::sink::StorageSink;
use crate::target::DEFAULT_MEASUREMENT;

/// Sink that records batches in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Batch>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Batch>> {
        // A panic while holding the lock leaves the Vec intact.
        self.batches.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of every batch written so far, in completion order.
    pub fn batches(&self) -> Vec<Batch> {
        self.lock().clone()
    }

    /// Sizes of the written batches, in completion order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().iter().map(Batch::len).collect()
    }

    pub fn tick_count(&self) -> usize {
        self.lock().iter().map(Batch::len).sum()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn write(&self, batch: &Batch) -> Result<(), WriteFailure> {
        self.lock().push(batch.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Sink that logs every point in line protocol and discards it.
#[derive(Debug, Clone)]
pub struct LogSink {
    measurement: String,
}

impl LogSink {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(DEFAULT_MEASUREMENT)
    }
}

#[async_trait]
impl StorageSink for LogSink {
    async fn write(&self, batch: &Batch) -> Result<(), WriteFailure> {
        for tick in batch.ticks() {
            match Point::from_tick(&self.measurement, tick).and_then(|p| p.to_line()) {
                Ok(line) => info!(batch_id = %batch.id(), "{line}"),
                Err(e) => warn!(
                    batch_id = %batch.id(),
                    instrument_id = %tick.instrument_id,
                    error = %e,
                    "Point not printable"
                ),
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tick_types::batch::BatchId;
    use tick_types::record::{Tick, TickFields};

    fn batch(id: u64, n: usize) -> Batch {
        let ticks = (0..n)
            .map(|i| Tick {
                instrument_id: format!("rb17{:02}", i % 3),
                trading_day: "20170105".to_string(),
                action_day: "20170105".to_string(),
                update_time: "09:30:00".to_string(),
                update_millisec: 0,
                timestamp: Utc.with_ymd_and_hms(2017, 1, 5, 1, 30, 0).unwrap(),
                fields: TickFields::default(),
            })
            .collect();
        Batch::new(BatchId::new(id), ticks).unwrap()
    }

    #[tokio::test]
    async fn test_memory_sink_records_batches() {
        let sink = MemorySink::new();
        sink.write(&batch(0, 4)).await.unwrap();
        sink.write(&batch(1, 2)).await.unwrap();

        assert_eq!(sink.batch_sizes(), vec![4, 2]);
        assert_eq!(sink.tick_count(), 6);
        assert_eq!(sink.batches()[1].id(), BatchId::new(1));

        sink.clear();
        assert_eq!(sink.tick_count(), 0);
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        let sink = LogSink::default();
        assert!(sink.write(&batch(0, 3)).await.is_ok());

        let mut bad = batch(1, 1).into_ticks();
        bad[0].fields.last_price = f64::NAN;
        assert!(sink.write(&Batch::new(BatchId::new(1), bad).unwrap()).await.is_ok());
        assert_eq!(sink.name(), "log");
    }
}
