//! Criterion value model
//!
//! Values are decided once, at parse time, from the declared type hint.
//! Every generator downstream pattern-matches this closed set instead of
//! re-sniffing raw strings.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Declared value type hint for a criterion.
///
/// Drives type coercion of incoming string values and the SQL `CAST` hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    #[default]
    Auto,
    Str,
    Bool,
    Int,
    Float,
    Time,
    Object,
    Array,
    Raw,
}

impl Type {
    /// Parse a grammar type token. Unknown tokens fall back to `str`
    /// rather than failing; `date` is accepted as an alias for `time`.
    pub fn from_token(token: &str) -> Self {
        match token {
            "" | "auto" => Self::Auto,
            "str" => Self::Str,
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "time" | "date" => Self::Time,
            "object" => Self::Object,
            "array" => Self::Array,
            "raw" => Self::Raw,
            _ => Self::Str,
        }
    }

    pub fn is_auto(&self) -> bool {
        *self == Self::Auto
    }

    pub const fn token(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Time => "time",
            Self::Object => "object",
            Self::Array => "array",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A single criterion value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    #[default]
    Null,
}

impl Value {
    /// Infer a value from its textual form: `null`, booleans, integers,
    /// floats, everything else a string.
    pub fn autotype(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("null") {
            return Self::Null;
        }

        if raw.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }

        if raw.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }

        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }

        if let Ok(f) = raw.parse::<f64>() {
            return Self::Float(f);
        }

        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return Self::Time(t.with_timezone(&Utc));
        }

        Self::String(raw.to_string())
    }

    /// Coerce a raw string into the declared type. The literal `null` is
    /// null under every type; declared-type failures report the offending
    /// field and value.
    pub fn coerce(field: &str, raw: &str, declared: Type) -> Result<Self, FilterError> {
        if raw.eq_ignore_ascii_case("null") {
            return Ok(Self::Null);
        }

        match declared {
            Type::Auto => Ok(Self::autotype(raw)),
            Type::Str | Type::Object | Type::Array | Type::Raw => {
                Ok(Self::String(raw.to_string()))
            }
            Type::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Self::Bool(true)),
                "false" | "f" | "0" => Ok(Self::Bool(false)),
                _ => Err(FilterError::conversion(field, raw, "bool")),
            },
            Type::Int => raw
                .parse::<i64>()
                .map(Self::Int)
                .map_err(|_| FilterError::conversion(field, raw, "int")),
            Type::Float => raw
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|_| FilterError::conversion(field, raw, "float")),
            Type::Time => parse_time(field, raw).map(Self::Time),
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::Null
    }

    /// Numeric view of the value, where one exists.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Time(t) => Some(t.timestamp() as f64),
            Self::String(s) => s.parse::<f64>().ok(),
            Self::Null => None,
        }
    }

    /// The JSON form used in Elasticsearch and MongoDB payloads.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Time(t) => {
                serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Self::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Null => f.write_str("null"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;

        match json {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(de::Error::custom("number out of range"))
                }
            }
            serde_json::Value::String(s) => Ok(Self::String(s)),
            other => Err(de::Error::custom(format!(
                "cannot represent {other} as a criterion value"
            ))),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Time(t)
    }
}

/// Flexible time coercion: `now`, signed relative offsets (`-5m`, `+2h30m`),
/// RFC 3339 stamps, calendar dates, and integer epoch seconds.
pub(crate) fn parse_time(field: &str, raw: &str) -> Result<DateTime<Utc>, FilterError> {
    if raw == "now" {
        return Ok(Utc::now());
    }

    if let Some(rest) = raw.strip_prefix('-') {
        if let Some(delta) = parse_duration(rest) {
            return Ok(Utc::now() - delta);
        }
    }

    if let Some(rest) = raw.strip_prefix('+') {
        if let Some(delta) = parse_duration(rest) {
            return Ok(Utc::now() + delta);
        }
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }

    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Ok(t.and_utc());
        }
    }

    if let Ok(epoch) = raw.parse::<i64>() {
        if let Some(t) = DateTime::from_timestamp(epoch, 0) {
            return Ok(t);
        }
    }

    Err(FilterError::conversion(field, raw, "time"))
}

/// Parse compound duration tokens such as `90s`, `5m`, or `2h30m`.
fn parse_duration(raw: &str) -> Option<Duration> {
    if raw.is_empty() {
        return None;
    }

    let mut total = Duration::zero();
    let mut digits = String::new();

    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let count: i64 = digits.parse().ok()?;
        digits.clear();

        total += match c {
            's' => Duration::seconds(count),
            'm' => Duration::minutes(count),
            'h' => Duration::hours(count),
            'd' => Duration::days(count),
            'w' => Duration::weeks(count),
            _ => return None,
        };
    }

    if digits.is_empty() { Some(total) } else { None }
}
