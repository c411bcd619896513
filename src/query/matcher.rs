//! Predicate evaluation against stored entities
//!
//! No type coercion: a string never equals a number. Missing and null fields
//! never match, except for `ne` where a missing field differs from any value.

use std::cmp::Ordering;

use serde_json::Value;

use super::filter::{FilterOp, Predicate};
use crate::entity::Entity;

/// Evaluates predicates against entities
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if an entity matches all predicates
    pub fn matches(entity: &Entity, predicates: &[Predicate]) -> bool {
        predicates
            .iter()
            .all(|pred| Self::matches_predicate(entity, pred))
    }

    fn matches_predicate(entity: &Entity, predicate: &Predicate) -> bool {
        let field_value = match entity.get(&predicate.field) {
            Some(v) if !v.is_null() => v,
            _ => return matches!(predicate.op, FilterOp::Ne(_)),
        };

        match &predicate.op {
            FilterOp::Eq(expected) => field_value == expected,
            FilterOp::Ne(expected) => field_value != expected,
            FilterOp::In(values) => values.iter().any(|v| v == field_value),
            FilterOp::Gte(bound) => Self::compare(field_value, bound)
                .map_or(false, |o| o != Ordering::Less),
            FilterOp::Gt(bound) => Self::compare(field_value, bound) == Some(Ordering::Greater),
            FilterOp::Lte(bound) => Self::compare(field_value, bound)
                .map_or(false, |o| o != Ordering::Greater),
            FilterOp::Lt(bound) => Self::compare(field_value, bound) == Some(Ordering::Less),
        }
    }

    /// Orders numbers numerically and strings lexically
    fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
        match (actual, bound) {
            (Value::Number(a), Value::Number(b)) => {
                if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                    return Some(ai.cmp(&bi));
                }
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_equality_match() {
        let doc = entity(json!({"name": "Alice", "age": 30}));
        assert!(PredicateFilter::matches(&doc, &[Predicate::eq("name", json!("Alice"))]));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::eq("name", json!("Bob"))]));
    }

    #[test]
    fn test_no_type_coercion() {
        let doc = entity(json!({"value": 123}));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::eq("value", json!("123"))]));
        assert!(PredicateFilter::matches(&doc, &[Predicate::eq("value", json!(123))]));
    }

    #[test]
    fn test_range_predicates() {
        let doc = entity(json!({"age": 25}));
        assert!(PredicateFilter::matches(&doc, &[Predicate::gte("age", json!(18))]));
        assert!(PredicateFilter::matches(&doc, &[Predicate::lte("age", json!(30))]));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::gt("age", json!(25))]));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::lt("age", json!(25))]));
        assert!(PredicateFilter::matches(&doc, &[Predicate::lt("age", json!(25.5))]));
    }

    #[test]
    fn test_in_and_ne() {
        let doc = entity(json!({"role": "admin"}));
        assert!(PredicateFilter::matches(
            &doc,
            &[Predicate::is_in("role", vec![json!("user"), json!("admin")])]
        ));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::ne("role", json!("admin"))]));
        assert!(PredicateFilter::matches(&doc, &[Predicate::ne("missing", json!(1))]));
    }

    #[test]
    fn test_missing_and_null_never_match() {
        let doc = entity(json!({"name": null}));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::eq("name", json!("Alice"))]));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::eq("age", json!(30))]));
    }
}
