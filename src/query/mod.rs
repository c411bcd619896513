//! Query filter types
//!
//! Filters are plain data passed through the mapper to drivers, plus the
//! predicate evaluator used by the in-memory driver.

mod filter;
mod matcher;

pub use filter::{Filter, FilterOp, Predicate};
pub use matcher::PredicateFilter;
