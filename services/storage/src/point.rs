//! Storage points and line-protocol encoding
//!
//! Each admitted tick becomes one point:
//!
//! ```text
//! <measurement>,instrument_id=<id> <field>=<value>[,...] <unix nanos>
//! ```
//!
//! Prices are float fields, volumes integer fields (`i` suffix). The
//! field set comes from `TickFields::float_values` / `int_values`, so
//! it always matches the record layout.

use std::fmt::Write as _;

use tick_types::batch::Batch;
use tick_types::record::Tick;
use tick_types::time::unix_nanos;

use crate::error::BackendError;

/// Tag key carrying the instrument identity.
pub const INSTRUMENT_TAG: &str = "instrument_id";

/// A single field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

/// One storage point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, FieldValue)>,
    /// Nanoseconds since the Unix epoch (UTC)
    pub timestamp: i64,
}

impl Point {
    /// Build the point for one tick.
    pub fn from_tick(measurement: &str, tick: &Tick) -> Result<Self, BackendError> {
        let timestamp = unix_nanos(&tick.timestamp).ok_or_else(|| {
            BackendError::Encode(format!(
                "timestamp of {} outside nanosecond range",
                tick.instrument_id
            ))
        })?;

        let mut fields: Vec<(String, FieldValue)> = tick
            .fields
            .float_values()
            .iter()
            .map(|(name, value)| (name.to_string(), FieldValue::Float(*value)))
            .collect();
        fields.extend(
            tick.fields
                .int_values()
                .iter()
                .map(|(name, value)| (name.to_string(), FieldValue::Integer(*value))),
        );

        Ok(Self {
            measurement: measurement.to_string(),
            tags: vec![(INSTRUMENT_TAG.to_string(), tick.instrument_id.clone())],
            fields,
            timestamp,
        })
    }

    /// Value of a tag, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a field, if present.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    /// Append this point as one line-protocol line (no trailing newline).
    pub fn write_line(&self, out: &mut String) -> Result<(), BackendError> {
        if self.fields.is_empty() {
            return Err(BackendError::Encode(format!(
                "point in {} has no fields",
                self.measurement
            )));
        }

        escape_into(out, &self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            out.push(',');
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            escape_into(out, value, &[',', '=', ' ']);
        }

        out.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            match value {
                FieldValue::Float(v) if v.is_finite() => {
                    let _ = write!(out, "{v:?}");
                }
                FieldValue::Float(v) => {
                    return Err(BackendError::Encode(format!("field {key} is {v}")));
                }
                FieldValue::Integer(v) => {
                    let _ = write!(out, "{v}i");
                }
            }
        }

        let _ = write!(out, " {}", self.timestamp);
        Ok(())
    }

    pub fn to_line(&self) -> Result<String, BackendError> {
        let mut line = String::with_capacity(512);
        self.write_line(&mut line)?;
        Ok(line)
    }
}

/// Encode a whole batch as a newline-separated line-protocol body.
pub fn encode_batch(measurement: &str, batch: &Batch) -> Result<String, BackendError> {
    let mut body = String::with_capacity(batch.len() * 512);
    for tick in batch.ticks() {
        Point::from_tick(measurement, tick)?.write_line(&mut body)?;
        body.push('\n');
    }
    Ok(body)
}

/// Points for every tick of a batch, in batch order.
pub fn batch_points(measurement: &str, batch: &Batch) -> Result<Vec<Point>, BackendError> {
    batch
        .ticks()
        .iter()
        .map(|tick| Point::from_tick(measurement, tick))
        .collect()
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tick_types::batch::BatchId;
    use tick_types::record::{PriceLevel, TickFields};

    fn tick(instrument: &str, millis: u32) -> Tick {
        let mut fields = TickFields {
            last_price: 3512.5,
            volume: 1200,
            ..TickFields::default()
        };
        fields.bids[0] = PriceLevel::new(3512.0, 15);
        Tick {
            instrument_id: instrument.to_string(),
            trading_day: "20170105".to_string(),
            action_day: "20170105".to_string(),
            update_time: "09:30:00".to_string(),
            update_millisec: millis as i32,
            timestamp: Utc.with_ymd_and_hms(2017, 1, 5, 1, 30, 0).unwrap()
                + chrono::Duration::milliseconds(millis as i64),
            fields,
        }
    }

    #[test]
    fn test_point_from_tick() {
        let point = Point::from_tick("ctp", &tick("rb1705", 500)).unwrap();
        assert_eq!(point.measurement, "ctp");
        assert_eq!(point.tag(INSTRUMENT_TAG), Some("rb1705"));
        assert_eq!(point.field("LastPrice"), Some(FieldValue::Float(3512.5)));
        assert_eq!(point.field("Volume"), Some(FieldValue::Integer(1200)));
        assert_eq!(point.field("BidVolume1"), Some(FieldValue::Integer(15)));
        assert_eq!(point.timestamp, 1_483_579_800_500_000_000);
    }

    #[test]
    fn test_line_layout() {
        let line = Point::from_tick("ctp", &tick("rb1705", 0)).unwrap().to_line().unwrap();
        assert!(line.starts_with("ctp,instrument_id=rb1705 LastPrice=3512.5,"));
        assert!(line.contains(",Volume=1200i,"));
        assert!(line.contains(",BidPrice1=3512.0,"));
        assert!(line.ends_with(" 1483579800000000000"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_escaping() {
        let point = Point {
            measurement: "tick data,raw".to_string(),
            tags: vec![("instrument_id".to_string(), "IF 17=09,x".to_string())],
            fields: vec![("Last Price".to_string(), FieldValue::Float(1.5))],
            timestamp: 1,
        };
        assert_eq!(
            point.to_line().unwrap(),
            r"tick\ data\,raw,instrument_id=IF\ 17\=09\,x Last\ Price=1.5 1"
        );
    }

    #[test]
    fn test_non_finite_field_is_rejected() {
        let point = Point {
            measurement: "ctp".to_string(),
            tags: Vec::new(),
            fields: vec![("LastPrice".to_string(), FieldValue::Float(f64::NAN))],
            timestamp: 1,
        };
        assert!(matches!(point.to_line(), Err(BackendError::Encode(_))));
    }

    #[test]
    fn test_large_values_use_exponent_form() {
        let point = Point {
            measurement: "ctp".to_string(),
            tags: Vec::new(),
            fields: vec![("UpperLimitPrice".to_string(), FieldValue::Float(f64::MAX))],
            timestamp: 1,
        };
        assert_eq!(
            point.to_line().unwrap(),
            "ctp UpperLimitPrice=1.7976931348623157e308 1"
        );
    }

    #[test]
    fn test_encode_batch_one_line_per_tick() {
        let batch = Batch::new(
            BatchId::new(1),
            vec![tick("rb1705", 0), tick("cu1703", 500), tick("rb1705", 999)],
        )
        .unwrap();
        let body = encode_batch("ctp", &batch).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("ctp,instrument_id=cu1703 "));

        let points = batch_points("ctp", &batch).unwrap();
        assert_eq!(points.len(), 3);
        assert!(points[0].timestamp < points[2].timestamp);
    }
}
