//! Value casters
//!
//! `iso_timestamp` keeps timestamp columns in canonical RFC 3339 UTC form
//! with millisecond precision.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::schema::{parse_timestamp, Caster, Direction};

/// Caster for timestamp columns
///
/// On input, epoch milliseconds and RFC 3339 strings become canonical
/// strings. On output and normalization, strings are canonicalized. Anything
/// unparsable passes through untouched.
pub fn iso_timestamp() -> Caster {
    Caster::new(cast_iso_timestamp)
}

fn cast_iso_timestamp(value: Value, direction: Direction) -> Value {
    let parsed = match (&value, direction) {
        (Value::String(s), _) => parse_timestamp(s),
        (Value::Number(n), Direction::Input) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    };
    match parsed {
        Some(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_is_canonicalized() {
        let caster = iso_timestamp();
        assert_eq!(
            caster.apply(json!("2024-03-01T12:00:00+02:00"), Direction::Input),
            json!("2024-03-01T10:00:00.000Z")
        );
        assert_eq!(
            caster.apply(json!("2024-03-01T10:00:00Z"), Direction::Normalize),
            json!("2024-03-01T10:00:00.000Z")
        );
    }

    #[test]
    fn test_epoch_millis_on_input_only() {
        let caster = iso_timestamp();
        assert_eq!(
            caster.apply(json!(0), Direction::Input),
            json!("1970-01-01T00:00:00.000Z")
        );
        assert_eq!(caster.apply(json!(0), Direction::Output), json!(0));
    }

    #[test]
    fn test_unparsable_passes_through() {
        let caster = iso_timestamp();
        assert_eq!(caster.apply(json!("soon"), Direction::Input), json!("soon"));
        assert_eq!(caster.apply(json!(null), Direction::Output), json!(null));
    }
}
