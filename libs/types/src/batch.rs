//! Batches of admitted ticks
//!
//! A batch is the unit of persistence: it is written as a whole or not
//! at all. Batches are moved between stages, never shared, so exactly
//! one owner sees a given set of ticks at any time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::record::Tick;

/// Dispatch-order identifier of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(u64);

impl BatchId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered, non-empty group of ticks flushed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BatchParts")]
pub struct Batch {
    id: BatchId,
    ticks: Vec<Tick>,
}

#[derive(Deserialize)]
struct BatchParts {
    id: BatchId,
    ticks: Vec<Tick>,
}

impl TryFrom<BatchParts> for Batch {
    type Error = &'static str;

    fn try_from(parts: BatchParts) -> Result<Self, Self::Error> {
        Batch::new(parts.id, parts.ticks).ok_or("batch without ticks")
    }
}

impl Batch {
    /// `None` when `ticks` is empty.
    pub fn new(id: BatchId, ticks: Vec<Tick>) -> Option<Self> {
        if ticks.is_empty() {
            return None;
        }
        Some(Self { id, ticks })
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Ticks in arrival order.
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn into_ticks(self) -> Vec<Tick> {
        self.ticks
    }

    /// Up to `limit` distinct instrument ids, in first-seen order.
    ///
    /// Used for failure reports, which must stay small.
    pub fn instrument_sample(&self, limit: usize) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut sample = Vec::new();
        for tick in &self.ticks {
            if sample.len() >= limit {
                break;
            }
            if seen.insert(tick.instrument_id.as_str()) {
                sample.push(tick.instrument_id.clone());
            }
        }
        sample
    }

    /// Number of distinct instruments in the batch.
    pub fn instrument_count(&self) -> usize {
        self.ticks
            .iter()
            .map(|t| t.instrument_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TickFields;
    use chrono::{TimeZone, Utc};

    fn tick(instrument: &str) -> Tick {
        Tick {
            instrument_id: instrument.to_string(),
            trading_day: "20170105".to_string(),
            action_day: "20170105".to_string(),
            update_time: "09:30:00".to_string(),
            update_millisec: 0,
            timestamp: Utc.with_ymd_and_hms(2017, 1, 5, 1, 30, 0).unwrap(),
            fields: TickFields::default(),
        }
    }

    #[test]
    fn test_instrument_sample_is_distinct_and_bounded() {
        let batch = Batch::new(
            BatchId::new(7),
            vec![tick("rb1705"), tick("rb1705"), tick("cu1703"), tick("ag1706"), tick("au1706")],
        )
        .unwrap();
        assert_eq!(batch.instrument_sample(3), vec!["rb1705", "cu1703", "ag1706"]);
        assert_eq!(batch.instrument_count(), 4);
        assert_eq!(batch.len(), 5);
        assert_eq!(batch.id().value(), 7);
    }

    #[test]
    fn test_empty_batch_is_refused() {
        assert!(Batch::new(BatchId::new(0), Vec::new()).is_none());

        let json = r#"{"id":3,"ticks":[]}"#;
        assert!(serde_json::from_str::<Batch>(json).is_err());
    }

    #[test]
    fn test_batch_json_round_trip_keeps_order() {
        let batch = Batch::new(BatchId::new(3), vec![tick("rb1705"), tick("cu1703")]).unwrap();
        let json = serde_json::to_string(&batch).unwrap();
        assert_eq!(serde_json::from_str::<Batch>(&json).unwrap(), batch);
    }
}
