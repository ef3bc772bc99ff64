//! Exchange-local time helpers
//!
//! OKX bars and user-entered trendline anchors are expressed in GMT+8 wall-clock
//! time. Internally every timestamp is a `DateTime<Utc>`; these helpers convert at
//! the edges.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const GMT8_SECONDS: i32 = 8 * 3600;

pub fn gmt8() -> FixedOffset {
    match FixedOffset::east_opt(GMT8_SECONDS) {
        Some(offset) => offset,
        None => unreachable!("GMT+8 is within the ±24h offset range"),
    }
}

/// Parse `"2025-05-09 18:00:00"` (GMT+8) into UTC
pub fn parse_gmt8(s: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), LOCAL_FORMAT).ok()?;
    gmt8()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format_gmt8(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&gmt8()).format(LOCAL_FORMAT).to_string()
}

/// Serde adapter for anchor times written in GMT+8 wall-clock
///
/// Also accepts RFC 3339 so records written by other tools still load.
pub mod gmt8_format {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_gmt8(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_gmt8(&raw)
            .or_else(|| {
                DateTime::parse_from_rfc3339(&raw)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            })
            .ok_or_else(|| serde::de::Error::custom(format!("invalid GMT+8 time: {}", raw)))
    }
}
