//! Tick snapshot records
//!
//! A tick is one depth-market-data snapshot for one instrument at one
//! instant. It exists in two shapes:
//! - `RawTick`: exactly what the feed delivered, text still undecoded
//! - `Tick`: admitted by the validator, text decoded, timestamp derived
//!
//! Both are plain values. They are copied between stages and never
//! mutated after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::RawText;
use crate::LADDER_DEPTH;

/// Storage field names of the bid ladder prices, best level first.
pub const BID_PRICE_FIELDS: [&str; LADDER_DEPTH] =
    ["BidPrice1", "BidPrice2", "BidPrice3", "BidPrice4", "BidPrice5"];
/// Storage field names of the bid ladder volumes, best level first.
pub const BID_VOLUME_FIELDS: [&str; LADDER_DEPTH] =
    ["BidVolume1", "BidVolume2", "BidVolume3", "BidVolume4", "BidVolume5"];
/// Storage field names of the ask ladder prices, best level first.
pub const ASK_PRICE_FIELDS: [&str; LADDER_DEPTH] =
    ["AskPrice1", "AskPrice2", "AskPrice3", "AskPrice4", "AskPrice5"];
/// Storage field names of the ask ladder volumes, best level first.
pub const ASK_VOLUME_FIELDS: [&str; LADDER_DEPTH] =
    ["AskVolume1", "AskVolume2", "AskVolume3", "AskVolume4", "AskVolume5"];

/// Number of floating-point values in `TickFields`.
pub const FLOAT_FIELD_COUNT: usize = 16 + 2 * LADDER_DEPTH;
/// Number of integer values in `TickFields`.
pub const INT_FIELD_COUNT: usize = 1 + 2 * LADDER_DEPTH;

/// One level of the bid or ask ladder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub volume: i64,
}

impl PriceLevel {
    pub fn new(price: f64, volume: i64) -> Self {
        Self { price, volume }
    }
}

/// Numeric payload of a tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickFields {
    pub last_price: f64,
    pub pre_settlement_price: f64,
    pub pre_close_price: f64,
    pub pre_open_interest: f64,
    pub open_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub volume: i64,
    pub turnover: f64,
    pub open_interest: f64,
    pub close_price: f64,
    pub settlement_price: f64,
    pub upper_limit_price: f64,
    pub lower_limit_price: f64,
    pub pre_delta: f64,
    pub curr_delta: f64,
    pub average_price: f64,
    pub bids: [PriceLevel; LADDER_DEPTH],
    pub asks: [PriceLevel; LADDER_DEPTH],
}

impl TickFields {
    /// Every floating-point value paired with its storage field name.
    ///
    /// The destructuring below is exhaustive, so adding a field to the
    /// struct without naming it here fails to compile.
    pub fn float_values(&self) -> [(&'static str, f64); FLOAT_FIELD_COUNT] {
        let TickFields {
            last_price,
            pre_settlement_price,
            pre_close_price,
            pre_open_interest,
            open_price,
            highest_price,
            lowest_price,
            volume: _,
            turnover,
            open_interest,
            close_price,
            settlement_price,
            upper_limit_price,
            lower_limit_price,
            pre_delta,
            curr_delta,
            average_price,
            bids,
            asks,
        } = self;

        let mut values = [("", 0.0); FLOAT_FIELD_COUNT];
        let scalars = [
            ("LastPrice", *last_price),
            ("PreSettlementPrice", *pre_settlement_price),
            ("PreClosePrice", *pre_close_price),
            ("PreOpenInterest", *pre_open_interest),
            ("OpenPrice", *open_price),
            ("HighestPrice", *highest_price),
            ("LowestPrice", *lowest_price),
            ("Turnover", *turnover),
            ("OpenInterest", *open_interest),
            ("ClosePrice", *close_price),
            ("SettlementPrice", *settlement_price),
            ("UpperLimitPrice", *upper_limit_price),
            ("LowerLimitPrice", *lower_limit_price),
            ("PreDelta", *pre_delta),
            ("CurrDelta", *curr_delta),
            ("AveragePrice", *average_price),
        ];
        let (head, ladder) = values.split_at_mut(scalars.len());
        head.copy_from_slice(&scalars);
        for level in 0..LADDER_DEPTH {
            ladder[2 * level] = (BID_PRICE_FIELDS[level], bids[level].price);
            ladder[2 * level + 1] = (ASK_PRICE_FIELDS[level], asks[level].price);
        }
        values
    }

    /// Every integer value paired with its storage field name.
    pub fn int_values(&self) -> [(&'static str, i64); INT_FIELD_COUNT] {
        let mut values = [("", 0i64); INT_FIELD_COUNT];
        values[0] = ("Volume", self.volume);
        for level in 0..LADDER_DEPTH {
            values[1 + 2 * level] = (BID_VOLUME_FIELDS[level], self.bids[level].volume);
            values[2 + 2 * level] = (ASK_VOLUME_FIELDS[level], self.asks[level].volume);
        }
        values
    }

    /// Name of the first NaN or infinite value, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.float_values()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
            .map(|(name, _)| name)
    }
}

/// Tick exactly as the feed produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    pub instrument_id: RawText,
    pub trading_day: RawText,
    pub action_day: RawText,
    pub update_time: RawText,
    pub update_millisec: i32,
    #[serde(flatten)]
    pub fields: TickFields,
}

impl RawTick {
    /// Create a raw tick with an empty numeric payload.
    pub fn new(
        instrument_id: impl Into<RawText>,
        trading_day: impl Into<RawText>,
        action_day: impl Into<RawText>,
        update_time: impl Into<RawText>,
        update_millisec: i32,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            trading_day: trading_day.into(),
            action_day: action_day.into(),
            update_time: update_time.into(),
            update_millisec,
            fields: TickFields::default(),
        }
    }

    /// Replace the numeric payload.
    pub fn with_fields(mut self, fields: TickFields) -> Self {
        self.fields = fields;
        self
    }
}

/// Tick admitted into the pipeline.
///
/// Only the validator builds these, so every `Tick` has decoded text and
/// a constructible timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument_id: String,
    pub trading_day: String,
    pub action_day: String,
    pub update_time: String,
    pub update_millisec: i32,
    /// Exchange time converted to UTC
    pub timestamp: DateTime<Utc>,
    pub fields: TickFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> TickFields {
        let mut fields = TickFields {
            last_price: 3512.0,
            volume: 1200,
            turnover: 42_144_000.0,
            ..TickFields::default()
        };
        fields.bids[0] = PriceLevel::new(3511.0, 15);
        fields.asks[4] = PriceLevel::new(3516.0, 7);
        fields
    }

    #[test]
    fn test_float_values_cover_scalars_and_ladder() {
        let values = sample_fields().float_values();
        assert_eq!(values.len(), FLOAT_FIELD_COUNT);
        assert!(values.iter().all(|(name, _)| !name.is_empty()));
        assert!(values.contains(&("LastPrice", 3512.0)));
        assert!(values.contains(&("BidPrice1", 3511.0)));
        assert!(values.contains(&("AskPrice5", 3516.0)));
    }

    #[test]
    fn test_int_values_cover_volumes() {
        let values = sample_fields().int_values();
        assert_eq!(values[0], ("Volume", 1200));
        assert!(values.contains(&("BidVolume1", 15)));
        assert!(values.contains(&("AskVolume5", 7)));
        assert!(values.iter().all(|(name, _)| !name.is_empty()));
    }

    #[test]
    fn test_field_names_are_unique() {
        let fields = sample_fields();
        let mut names: Vec<&str> = fields.float_values().iter().map(|(n, _)| *n).collect();
        names.extend(fields.int_values().iter().map(|(n, _)| *n));
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_first_non_finite() {
        let mut fields = sample_fields();
        assert_eq!(fields.first_non_finite(), None);

        fields.asks[1].price = f64::INFINITY;
        fields.curr_delta = f64::NAN;
        assert_eq!(fields.first_non_finite(), Some("CurrDelta"));
    }

    #[test]
    fn test_raw_tick_json_roundtrip_keeps_bytes() {
        let raw = RawTick::new(vec![b'c', b'u', 0xff], "20170105", "20170105", "09:30:00", 500)
            .with_fields(sample_fields());
        let json = serde_json::to_string(&raw).unwrap();
        let back: RawTick = serde_json::from_str(&json).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_raw_tick_json_missing_numbers_default_to_zero() {
        let json = r#"{"instrument_id":"rb1705","trading_day":"20170105",
            "action_day":"20170105","update_time":"09:30:00","update_millisec":0,
            "last_price":3500.5}"#;
        let raw: RawTick = serde_json::from_str(json).unwrap();
        assert_eq!(raw.fields.last_price, 3500.5);
        assert_eq!(raw.fields.volume, 0);
        assert_eq!(raw.fields.bids[0], PriceLevel::default());
    }
}
