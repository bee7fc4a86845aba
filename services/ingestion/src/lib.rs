//! Tick Ingestion Service
//!
//! Drains a feed of raw market ticks, drops malformed records, groups
//! the rest into batches and persists them through a worker pool, with
//! write failures observed by a background fault monitor so storage
//! health never gates intake.
//!
//! # Architecture
//!
//! ```text
//!   Feed (gateway session / recorded session)
//!        │ RawTick
//!   ┌────▼─────┐
//!   │Validator │  ← length, decode, finiteness, timestamp checks
//!   └────┬─────┘
//!        │ Tick
//!   ┌────▼──────┐
//!   │Accumulator│  ← size or interval triggered
//!   └────┬──────┘
//!        │ Batch (unbounded queue)
//!   ┌────▼───────┐      attempts       ┌────────────┐
//!   │ WorkerPool ├────────────────────▶│FaultMonitor│
//!   └────┬───────┘                     └────────────┘
//!        │
//!   StorageSink (InfluxDB + continuous-query ladder)
//! ```

pub mod accumulator;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod monitor;
pub mod pipeline;
pub mod pool;
pub mod validator;

pub use accumulator::BatchAccumulator;
pub use config::{ConfigError, IngestConfig};
pub use error::IngestError;
pub use feed::{ChannelFeed, Feed, JsonLinesFeed, Pull};
pub use metrics::{IngestMetrics, MetricsSnapshot};
pub use monitor::{FaultMonitor, MonitorReport, WriteOutcome};
pub use pipeline::{Pipeline, RunSummary};
pub use pool::WorkerPool;
pub use validator::{Rejected, Validator};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
