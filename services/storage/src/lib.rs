//! Tick Storage
//!
//! Persists batches of admitted ticks. Provides:
//! - connection target resolution (URI and/or discrete options)
//! - line-protocol encoding of ticks
//! - idempotent provisioning of the database and its downsampling ladder
//! - the `StorageSink` trait with InfluxDB, in-memory and log sinks

pub mod downsample;
pub mod error;
pub mod influx;
pub mod memory;
pub mod point;
pub mod sink;
pub mod target;

pub use error::{BackendError, ProvisioningError, TargetError, WriteFailure};
pub use influx::InfluxSink;
pub use memory::{LogSink, MemorySink};
pub use sink::StorageSink;
pub use target::{ConnectionTarget, InfluxOptions};
