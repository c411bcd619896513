//! Schema subsystem
//!
//! Entity types are declared and decorated on a `SchemaRegistry`, then frozen
//! into an immutable `Schema` that materializers and mappers read from.
//!
//! # Lifecycle
//!
//! 1. `SchemaRegistry::declare` / `define` entity types (single-threaded)
//! 2. Decorate columns with `column`, `join`, `join_all`
//! 3. `freeze` into a `Schema`; optionally `install` it process-wide
//!
//! A frozen schema is never mutated and is safe to share across threads.

mod errors;
mod format;
mod projection;
mod registry;
mod snapshot;
mod types;
mod validator;

pub use errors::{Phase, SchemaError, SchemaErrorCode, SchemaResult};
pub use format::{parse_date, parse_timestamp, Format, FormatKind, Items};
pub use projection::{is_visible, nested_fields};
pub use registry::{ColumnDecorator, SchemaRegistry};
pub use snapshot::{global, install, JoinDescriptor, Schema};
pub use types::{
    Caster, Column, ColumnKind, Direction, Join, ModelId, ModelRef, Row, Storage, Structure,
};
pub use validator::{Rule, Validation};
