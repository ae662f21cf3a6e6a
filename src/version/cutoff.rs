//! Publish-time cutoff (`before`) handling

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

/// Parse an instant given as RFC 3339 or as a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_instant(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Human-readable form used in error messages
pub fn display_instant(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Accepts a date string or epoch milliseconds
pub(crate) fn deserialize_before<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Before {
        Millis(i64),
        Text(String),
    }

    match Option::<Before>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Before::Millis(ms)) => DateTime::from_timestamp_millis(ms)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {ms}"))),
        Some(Before::Text(text)) => parse_instant(&text)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid date: {text}"))),
    }
}

/// Decides which releases are old enough to be picked
///
/// Inactive when no cutoff was requested or the packument carries no publish times.
#[derive(Debug, Clone, Copy)]
pub struct Cutoff<'a> {
    times: Option<&'a IndexMap<String, Value>>,
    before: Option<DateTime<Utc>>,
}

impl<'a> Cutoff<'a> {
    pub fn new(times: Option<&'a IndexMap<String, Value>>, before: Option<DateTime<Utc>>) -> Self {
        Self { times, before }
    }

    /// Versions without a recorded publish time always pass; unparseable times never do
    pub fn allows(&self, version: &str) -> bool {
        let (Some(times), Some(before)) = (self.times, self.before) else {
            return true;
        };

        match times.get(version) {
            None | Some(Value::Null) => true,
            Some(Value::String(published)) if published.is_empty() => true,
            Some(Value::String(published)) => {
                parse_instant(published).is_some_and(|published| published <= before)
            }
            Some(_) => false,
        }
    }
}
