//! Column formats
//!
//! A format describes one accepted value shape. Columns accept the union of
//! their formats. `Array`, `Map` and `Object` are structural and drive the
//! materializers' dispatch; every other format is a scalar predicate.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;

use super::types::ModelRef;

/// Fieldless format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Id,
    Null,
    Binary,
    Boolean,
    Integer,
    Decimal,
    Number,
    String,
    Enumeration,
    Pattern,
    Timestamp,
    Date,
    Array,
    Map,
    Object,
}

impl FormatKind {
    /// Returns the format name for error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Id => "id",
            FormatKind::Null => "null",
            FormatKind::Binary => "binary",
            FormatKind::Boolean => "boolean",
            FormatKind::Integer => "integer",
            FormatKind::Decimal => "decimal",
            FormatKind::Number => "number",
            FormatKind::String => "string",
            FormatKind::Enumeration => "enumeration",
            FormatKind::Pattern => "pattern",
            FormatKind::Timestamp => "timestamp",
            FormatKind::Date => "date",
            FormatKind::Array => "array",
            FormatKind::Map => "map",
            FormatKind::Object => "object",
        }
    }

    /// Returns true for formats that nest values
    pub fn is_structural(&self) -> bool {
        matches!(self, FormatKind::Array | FormatKind::Map | FormatKind::Object)
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Element type of an array or map column
#[derive(Debug, Clone)]
pub enum Items {
    /// Elements are not checked
    Any,
    /// Elements must match a scalar format
    Format(Box<Format>),
    /// Elements are nested entities
    Entity(ModelRef),
}

impl Items {
    /// Returns the nested entity reference, if elements are entities
    pub fn model(&self) -> Option<&ModelRef> {
        match self {
            Items::Entity(model) => Some(model),
            _ => None,
        }
    }

    fn validate(&self, value: &Value) -> bool {
        match self {
            Items::Any => true,
            Items::Format(format) => format.validate(value),
            Items::Entity(_) => value.is_object(),
        }
    }
}

/// Accepted value format with its parameters
#[derive(Debug, Clone)]
pub enum Format {
    /// Non-empty string or unsigned integer identifier
    Id,
    /// JSON null
    Null,
    /// Base64 encoded string
    Binary,
    /// Boolean
    Boolean,
    /// Integer with optional inclusive bounds
    Integer { min: Option<i64>, max: Option<i64> },
    /// Decimal number encoded as a string, e.g. "12.50"
    Decimal { min: Option<f64>, max: Option<f64> },
    /// Any JSON number with optional inclusive bounds
    Number { min: Option<f64>, max: Option<f64> },
    /// String with optional character length bounds
    String { min: Option<usize>, max: Option<usize> },
    /// One of a fixed set of strings
    Enumeration(Vec<String>),
    /// String matching a regular expression
    Pattern(Regex),
    /// RFC 3339 timestamp with optional bounds
    Timestamp {
        min: Option<DateTime<Utc>>,
        max: Option<DateTime<Utc>>,
    },
    /// Calendar date (`YYYY-MM-DD` or RFC 3339) with optional bounds
    Date {
        min: Option<NaiveDate>,
        max: Option<NaiveDate>,
    },
    /// Array of items
    Array {
        items: Items,
        unique: bool,
        min: Option<usize>,
        max: Option<usize>,
    },
    /// String keyed map of items
    Map { values: Items },
    /// Single nested entity
    Object { model: ModelRef },
}

impl Format {
    /// Returns the fieldless tag
    pub fn kind(&self) -> FormatKind {
        match self {
            Format::Id => FormatKind::Id,
            Format::Null => FormatKind::Null,
            Format::Binary => FormatKind::Binary,
            Format::Boolean => FormatKind::Boolean,
            Format::Integer { .. } => FormatKind::Integer,
            Format::Decimal { .. } => FormatKind::Decimal,
            Format::Number { .. } => FormatKind::Number,
            Format::String { .. } => FormatKind::String,
            Format::Enumeration(_) => FormatKind::Enumeration,
            Format::Pattern(_) => FormatKind::Pattern,
            Format::Timestamp { .. } => FormatKind::Timestamp,
            Format::Date { .. } => FormatKind::Date,
            Format::Array { .. } => FormatKind::Array,
            Format::Map { .. } => FormatKind::Map,
            Format::Object { .. } => FormatKind::Object,
        }
    }

    /// Checks a present value against this format
    pub fn validate(&self, value: &Value) -> bool {
        match self {
            Format::Id => match value {
                Value::String(s) => !s.is_empty(),
                Value::Number(n) => n.is_u64(),
                _ => false,
            },
            Format::Null => value.is_null(),
            Format::Binary => value
                .as_str()
                .map_or(false, |s| STANDARD.decode(s).is_ok()),
            Format::Boolean => value.is_boolean(),
            Format::Integer { min, max } => value
                .as_i64()
                .map_or(false, |n| within(n, *min, *max)),
            Format::Decimal { min, max } => value
                .as_str()
                .filter(|s| is_decimal_literal(s))
                .and_then(|s| s.parse::<f64>().ok())
                .map_or(false, |n| within_f64(n, *min, *max)),
            Format::Number { min, max } => value
                .as_f64()
                .map_or(false, |n| within_f64(n, *min, *max)),
            Format::String { min, max } => value
                .as_str()
                .map_or(false, |s| within(s.chars().count(), *min, *max)),
            Format::Enumeration(values) => value
                .as_str()
                .map_or(false, |s| values.iter().any(|v| v == s)),
            Format::Pattern(regex) => value.as_str().map_or(false, |s| regex.is_match(s)),
            Format::Timestamp { min, max } => value
                .as_str()
                .and_then(parse_timestamp)
                .map_or(false, |ts| within(ts, *min, *max)),
            Format::Date { min, max } => value
                .as_str()
                .and_then(parse_date)
                .map_or(false, |date| within(date, *min, *max)),
            Format::Array {
                items,
                unique,
                min,
                max,
            } => match value.as_array() {
                Some(elements) => {
                    within(elements.len(), *min, *max)
                        && (!unique || all_distinct(elements))
                        && elements.iter().all(|e| items.validate(e))
                }
                None => false,
            },
            Format::Map { values } => value
                .as_object()
                .map_or(false, |map| map.values().all(|v| values.validate(v))),
            Format::Object { .. } => value.is_object(),
        }
    }
}

fn within<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
}

fn within_f64(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    value.is_finite() && within(value, min, max)
}

fn is_decimal_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits, None),
    };
    !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

fn all_distinct(elements: &[Value]) -> bool {
    elements
        .iter()
        .enumerate()
        .all(|(i, a)| elements[i + 1..].iter().all(|b| a != b))
}

/// Parses an RFC 3339 timestamp into UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Parses a calendar date from `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|ts| ts.date_naive()))
}
