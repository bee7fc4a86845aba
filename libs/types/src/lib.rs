//! Types library for the market-data ingestion pipeline
//!
//! Shared record definitions used by the ingestion and storage services,
//! so that both sides agree on the shape of a tick without depending on
//! each other.
//!
//! # Modules
//! - `text`: Fixed-width, NUL-padded byte text as delivered by the gateway
//! - `record`: Raw and admitted tick snapshots, bid/ask ladder levels
//! - `batch`: Ordered groups of admitted ticks handed to storage
//! - `time`: Exchange-local timestamp composition
//! - `errors`: Error taxonomy

// Public modules
pub mod text;
pub mod record;
pub mod batch;
pub mod time;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Number of bid/ask ladder levels carried by every tick.
pub const LADDER_DEPTH: usize = 5;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::*;
    pub use crate::errors::*;
    pub use crate::record::*;
    pub use crate::text::*;
    pub use crate::time::*;
    pub use crate::LADDER_DEPTH;
}
