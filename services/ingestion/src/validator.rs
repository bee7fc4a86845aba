//! Record admission
//!
//! Filters malformed ticks before they reach batching. Checks run in a
//! fixed order and the first failing one is reported:
//!
//! 1. `UpdateTime` is exactly 8 characters
//! 2. `ActionDay` is exactly 8 characters
//! 3. `InstrumentID` is longer than 2 characters
//! 4. every text field decodes as UTF-8
//! 5. every float field is finite
//! 6. the timestamp can be constructed
//!
//! Lengths are measured after trailing NUL padding is stripped.

use thiserror::Error;
use tracing::warn;

use tick_types::errors::TimestampError;
use tick_types::record::{RawTick, Tick};
use tick_types::text::RawText;
use tick_types::time::{compose_timestamp, DAY_WIDTH, TIME_WIDTH};

/// Minimum accepted instrument id length is this plus one.
pub const INSTRUMENT_ID_MIN_EXCLUSIVE: usize = 2;

/// Longest instrument id prefix ever written to a log line.
const LOG_ID_LIMIT: usize = 31;

/// Why a raw tick was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    #[error("UpdateTime has length {len}, expected 8")]
    BadUpdateTime { len: usize },

    #[error("ActionDay has length {len}, expected 8")]
    BadActionDay { len: usize },

    #[error("InstrumentID has length {len}, expected more than 2")]
    BadInstrumentId { len: usize },

    #[error("{field} is not valid text")]
    DecodeFailure { field: &'static str },

    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("timestamp not constructible: {0}")]
    BadTimestamp(#[source] TimestampError),
}

impl Rejected {
    /// Stable label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BadUpdateTime { .. } => "bad_update_time",
            Self::BadActionDay { .. } => "bad_action_day",
            Self::BadInstrumentId { .. } => "bad_instrument_id",
            Self::DecodeFailure { .. } => "decode_failure",
            Self::NonFinite { .. } => "non_finite",
            Self::BadTimestamp(_) => "bad_timestamp",
        }
    }

    /// Record field the rejection is about.
    pub fn field(&self) -> &'static str {
        match self {
            Self::BadUpdateTime { .. } => "UpdateTime",
            Self::BadActionDay { .. } => "ActionDay",
            Self::BadInstrumentId { .. } => "InstrumentID",
            Self::DecodeFailure { field } | Self::NonFinite { field } => *field,
            Self::BadTimestamp(TimestampError::Millisecond(_)) => "UpdateMillisec",
            Self::BadTimestamp(TimestampError::Time(_)) => "UpdateTime",
            Self::BadTimestamp(_) => "ActionDay",
        }
    }
}

/// Stateless admission filter.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    utc_offset_secs: i32,
}

impl Validator {
    pub fn new(utc_offset_secs: i32) -> Self {
        Self { utc_offset_secs }
    }

    /// Admit or reject a raw tick, logging every rejection.
    pub fn admit(&self, raw: RawTick) -> Result<Tick, Rejected> {
        let instrument = redacted_id(&raw.instrument_id);
        self.check(raw).map_err(|reason| {
            warn!(
                instrument_id = %instrument,
                field = reason.field(),
                reason = reason.reason(),
                detail = %reason,
                "Tick rejected"
            );
            reason
        })
    }

    /// Pure admission check, no logging.
    pub fn check(&self, raw: RawTick) -> Result<Tick, Rejected> {
        let update_time_len = raw.update_time.len();
        if update_time_len != TIME_WIDTH {
            return Err(Rejected::BadUpdateTime {
                len: update_time_len,
            });
        }
        let action_day_len = raw.action_day.len();
        if action_day_len != DAY_WIDTH {
            return Err(Rejected::BadActionDay {
                len: action_day_len,
            });
        }
        let instrument_len = raw.instrument_id.len();
        if instrument_len <= INSTRUMENT_ID_MIN_EXCLUSIVE {
            return Err(Rejected::BadInstrumentId {
                len: instrument_len,
            });
        }

        let instrument_id = decode(&raw.instrument_id, "InstrumentID")?;
        let trading_day = decode(&raw.trading_day, "TradingDay")?;
        let action_day = decode(&raw.action_day, "ActionDay")?;
        let update_time = decode(&raw.update_time, "UpdateTime")?;

        if let Some(field) = raw.fields.first_non_finite() {
            return Err(Rejected::NonFinite { field });
        }

        let timestamp = compose_timestamp(
            &action_day,
            &update_time,
            raw.update_millisec,
            self.utc_offset_secs,
        )
        .map_err(Rejected::BadTimestamp)?;

        Ok(Tick {
            instrument_id,
            trading_day,
            action_day,
            update_time,
            update_millisec: raw.update_millisec,
            timestamp,
            fields: raw.fields,
        })
    }
}

fn decode(text: &RawText, field: &'static str) -> Result<String, Rejected> {
    text.decode()
        .map(str::to_string)
        .map_err(|_| Rejected::DecodeFailure { field })
}

/// Instrument id safe for a log line: lossy, bounded.
fn redacted_id(text: &RawText) -> String {
    text.lossy().chars().take(LOG_ID_LIMIT).collect()
}
