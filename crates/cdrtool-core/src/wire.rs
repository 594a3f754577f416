//! Wire-format normalization for repository API payloads.
//!
//! The envelope API is loosely typed: dates arrive as `YYYY-MM-DDTHH:MM:SSZ`
//! strings or `""`, years as numbers or `""`, flags as `0`/`1` or booleans.
//! The helpers here turn those into explicit Rust values. An empty or missing
//! date is `None`, never a zero timestamp, so `Option` ordering puts it below
//! every real timestamp.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// The single timestamp format used by the repository API.
pub const WIRE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid wire date {raw:?}: {source}")]
    Date {
        raw: String,
        source: chrono::ParseError,
    },
}

/// Convert a wire date string into a UTC timestamp.
///
/// `""` (after trimming) converts to `None`.
pub fn parse_wire_date(raw: &str) -> Result<Option<DateTime<Utc>>, WireError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(trimmed, WIRE_DATE_FORMAT)
        .map(|naive| Some(naive.and_utc()))
        .map_err(|source| WireError::Date {
            raw: raw.to_string(),
            source,
        })
}

/// Format a timestamp back into the wire representation.
pub fn format_wire_date(ts: &DateTime<Utc>) -> String {
    ts.format(WIRE_DATE_FORMAT).to_string()
}

/// Serde adapter for optional wire dates. Pair with `#[serde(default)]` so an
/// absent key also becomes `None`.
pub fn date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_wire_date(&s).map_err(D::Error::custom),
    }
}

/// Years come back as numbers, numeric strings, `""`, or `null`.
pub fn year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("year out of range: {n}"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid year {s:?}: {e}"))),
        Some(other) => Err(D::Error::custom(format!("unexpected year value: {other}"))),
    }
}

/// Flags come back as `0`/`1`, booleans, or their string forms.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::Number(n)) => Ok(n.as_i64().unwrap_or(0) != 0),
        Some(Value::String(s)) => match s.trim() {
            "" | "0" | "false" | "False" => Ok(false),
            "1" | "true" | "True" => Ok(true),
            other => Err(D::Error::custom(format!("invalid flag {other:?}"))),
        },
        Some(other) => Err(D::Error::custom(format!("unexpected flag value: {other}"))),
    }
}

/// Identifiers that may be serialized as either strings or numbers.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(D::Error::custom(format!("unexpected text value: {other}"))),
    }
}

/// Lists of codes that may mix strings and numbers (obligation numbers).
pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    values
        .unwrap_or_default()
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!("unexpected list entry: {other}"))),
        })
        .collect()
}
