//! Entity materializers
//!
//! Three recursive engines walk a schema row and a JSON tree:
//!
//! - `Inputer`: caller data → entity headed for storage
//! - `Outputer`: storage data → entity handed back to the caller
//! - `Normalizer`: entity → plain transfer shape
//!
//! None of them keep state between calls. Each dispatches on
//! `Column::structure()` (array, map, object, scalar) and recurses into
//! nested entities through the schema.

pub mod caster;
mod inputer;
mod normalizer;
mod outputer;

pub use inputer::Inputer;
pub use normalizer::{NormalizeOptions, Normalizer};
pub use outputer::Outputer;

use serde_json::{Map, Value};

/// A materialized entity: canonical column name → value
pub type Entity = Map<String, Value>;

/// Column name used in errors about the top-level entry
pub(crate) const ROOT: &str = "$root";

/// Returns the JSON shape name for error messages
pub(crate) fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_names() {
        assert_eq!(shape_name(&json!(null)), "null");
        assert_eq!(shape_name(&json!(1)), "integer");
        assert_eq!(shape_name(&json!(1.5)), "number");
        assert_eq!(shape_name(&json!([])), "array");
        assert_eq!(shape_name(&json!({})), "object");
    }
}
