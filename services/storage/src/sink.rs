//! Storage sink abstraction

use async_trait::async_trait;
use tick_types::batch::Batch;

use crate::error::WriteFailure;

/// Destination for admitted batches.
///
/// Implementations must be callable concurrently from many workers and
/// must never retry: a failed write is reported once and the batch is
/// dropped by the caller.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Persist the whole batch, or fail as a whole.
    async fn write(&self, batch: &Batch) -> Result<(), WriteFailure>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
