//! Error types for tick records
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Failure to build a timestamp from exchange-local components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("Invalid calendar day: {0:?}")]
    Day(String),

    #[error("Invalid time of day: {0:?}")]
    Time(String),

    #[error("Millisecond out of range: {0}")]
    Millisecond(i32),

    #[error("Invalid UTC offset: {0}s")]
    Offset(i32),

    #[error("Timestamp outside representable range")]
    OutOfRange,
}
