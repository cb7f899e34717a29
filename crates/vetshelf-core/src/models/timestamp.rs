//! Canonical timestamp encoding.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with
//! millisecond precision (`2024-03-01T09:30:00.000Z`), so that string order
//! is chronological order in the store's indexes.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

use super::{ModelError, ModelResult};

/// Drop sub-millisecond precision.
pub fn normalize(date: DateTime<Utc>) -> DateTime<Utc> {
    date.trunc_subsecs(3)
}

/// Current time at stored precision.
pub fn now() -> DateTime<Utc> {
    normalize(Utc::now())
}

pub fn format(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp, converting to UTC.
pub fn parse(s: &str) -> ModelResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| normalize(d.with_timezone(&Utc)))
        .map_err(|e| ModelError::Value(format!("Unparseable date \"{}\": {}", s, e)))
}

pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(date))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}
