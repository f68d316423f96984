use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A UTC instant. Every timestamp field on every document goes through this
/// type, so the shape of what was persisted never leaks past deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current instant at millisecond precision, the precision every
    /// timestamp is persisted with.
    pub fn now() -> Self {
        Self(Utc::now().trunc_subsecs(3))
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// Normalize any persisted timestamp shape into a `Timestamp`.
    ///
    /// Accepted shapes:
    /// - RFC 3339 strings (`2024-05-01T10:00:00.000Z`)
    /// - SQLite `datetime('now')` strings (`2024-05-01 10:00:00`)
    /// - epoch milliseconds, as a number or a numeric string
    /// - document-store objects `{ "seconds": .., "nanoseconds": .. }`
    pub fn normalize(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => parse_str(s),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(Self::from_millis),
            Value::Object(map) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(Value::as_i64)?;
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                Utc.timestamp_opt(seconds, nanos.min(999_999_999) as u32)
                    .single()
                    .map(Self)
            }
            _ => None,
        }
    }
}

fn parse_str(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Timestamp(dt.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Timestamp(ndt.and_utc()));
        }
    }
    s.parse::<i64>().ok().and_then(Timestamp::from_millis)
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Timestamp::normalize(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_shapes_agree() {
        let expected = Timestamp::from_millis(1_714_557_600_000).unwrap();

        assert_eq!(Timestamp::normalize(&json!("2024-05-01T10:00:00Z")), Some(expected));
        assert_eq!(Timestamp::normalize(&json!("2024-05-01 10:00:00")), Some(expected));
        assert_eq!(Timestamp::normalize(&json!(1_714_557_600_000i64)), Some(expected));
        assert_eq!(Timestamp::normalize(&json!("1714557600000")), Some(expected));
        assert_eq!(
            Timestamp::normalize(&json!({ "seconds": 1_714_557_600, "nanoseconds": 0 })),
            Some(expected)
        );
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(Timestamp::normalize(&json!("yesterday")), None);
        assert_eq!(Timestamp::normalize(&json!(true)), None);
        assert_eq!(Timestamp::normalize(&json!({ "nanoseconds": 5 })), None);
    }

    #[test]
    fn test_serializes_as_rfc3339() {
        let ts = Timestamp::from_millis(1_714_557_600_123).unwrap();
        let json = serde_json::to_value(ts).unwrap();
        assert_eq!(json, json!("2024-05-01T10:00:00.123Z"));

        let back: Timestamp = serde_json::from_value(json).unwrap();
        assert_eq!(back, ts);
    }
}
