//! Schema type definitions
//!
//! - `ModelId` / `ModelRef`: arena handles for declared entity types
//! - `Column`: one property of an entity, real or virtual
//! - `Storage`: per-entity record of columns
//! - `Caster`: value hook applied in each conversion direction

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::format::{Format, FormatKind, Items};
use super::validator::Validation;
use crate::query::Filter;

/// Handle of a declared entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub(crate) usize);

impl ModelId {
    /// Arena index of this model
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to an entity type from a column
///
/// `Named` references are resolved by type name on access, which allows a
/// column to point at a type declared later (or at its own type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    Id(ModelId),
    Named(String),
}

impl From<ModelId> for ModelRef {
    fn from(id: ModelId) -> Self {
        ModelRef::Id(id)
    }
}

impl From<&str> for ModelRef {
    fn from(name: &str) -> Self {
        ModelRef::Named(name.to_string())
    }
}

impl From<String> for ModelRef {
    fn from(name: String) -> Self {
        ModelRef::Named(name)
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRef::Id(id) => write!(f, "{}", id),
            ModelRef::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Conversion direction passed to casters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Caller data headed for storage
    Input,
    /// Storage data headed for the caller
    Output,
    /// Materialized entity headed for transfer
    Normalize,
}

/// Value hook applied after structural conversion
#[derive(Clone)]
pub struct Caster(Arc<dyn Fn(Value, Direction) -> Value + Send + Sync>);

impl Caster {
    /// Wraps a casting function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value, Direction) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Applies the cast
    pub fn apply(&self, value: Value, direction: Direction) -> Value {
        (self.0)(value, direction)
    }
}

impl fmt::Debug for Caster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Caster(..)")
    }
}

/// Join description of a virtual column
#[derive(Debug, Clone)]
pub struct Join {
    /// Foreign entity
    pub model: ModelRef,
    /// Local real column holding the key
    pub local: String,
    /// Foreign column matched against the local key
    pub foreign: String,
    /// Local key is array valued
    pub multiple: bool,
    /// Load every match instead of the first
    pub all: bool,
    /// Pre-filter applied to the foreign storage
    pub query: Option<Filter>,
}

/// Column kind
#[derive(Debug, Clone)]
pub enum ColumnKind {
    /// Physically stored
    Real,
    /// Populated by a join against another entity
    Virtual(Join),
}

/// Structural shape selected for dispatch
#[derive(Debug, Clone, Copy)]
pub enum Structure<'a> {
    Array { items: &'a Items },
    Map { values: &'a Items },
    Object { model: &'a ModelRef },
    Scalar,
}

/// One property of an entity
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    pub(crate) kind: ColumnKind,
    pub(crate) validation: Validation,
    pub(crate) required: bool,
    pub(crate) hidden: bool,
    pub(crate) read_only: bool,
    pub(crate) write_only: bool,
    pub(crate) caster: Option<Caster>,
}

impl Column {
    pub(crate) fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            alias: None,
            kind,
            validation: Validation::new(),
            required: false,
            hidden: false,
            read_only: false,
            write_only: false,
            caster: None,
        }
    }

    /// Canonical property key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// External name, if any
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Alias, falling back to the canonical name
    pub fn external_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn is_real(&self) -> bool {
        matches!(self.kind, ColumnKind::Real)
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, ColumnKind::Virtual(_))
    }

    /// Join description for virtual columns
    pub fn join(&self) -> Option<&Join> {
        match &self.kind {
            ColumnKind::Virtual(join) => Some(join),
            ColumnKind::Real => None,
        }
    }

    /// Array values may carry one extra level of sub-arrays
    pub fn multiple(&self) -> bool {
        self.join().map_or(false, |join| join.multiple)
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_write_only(&self) -> bool {
        self.write_only
    }

    pub fn validation(&self) -> &Validation {
        &self.validation
    }

    /// Declared formats in declaration order
    pub fn formats(&self) -> impl Iterator<Item = &Format> {
        self.validation.formats()
    }

    pub fn has_format(&self, kind: FormatKind) -> bool {
        self.validation.has(kind)
    }

    /// Checks a possibly absent value against the column's formats
    pub fn validate(&self, value: Option<&Value>) -> bool {
        self.validation.validate(value)
    }

    /// First structural format declared, or `Scalar`
    pub fn structure(&self) -> Structure<'_> {
        for format in self.formats() {
            match format {
                Format::Array { items, .. } => return Structure::Array { items },
                Format::Map { values } => return Structure::Map { values },
                Format::Object { model } => return Structure::Object { model },
                _ => {}
            }
        }
        Structure::Scalar
    }

    /// Nested entity referenced by this column, if any
    pub fn model(&self) -> Option<&ModelRef> {
        match self.structure() {
            Structure::Array { items } => items.model(),
            Structure::Map { values } => values.model(),
            Structure::Object { model } => Some(model),
            Structure::Scalar => None,
        }
    }

    /// Applies the caster, if one is set
    pub fn cast(&self, value: Value, direction: Direction) -> Value {
        match &self.caster {
            Some(caster) => caster.apply(value, direction),
            None => value,
        }
    }
}

/// Per-entity record of columns
#[derive(Debug, Clone, Default)]
pub struct Storage {
    pub(crate) name: Option<String>,
    pub(crate) primary: Option<String>,
    pub(crate) columns: BTreeMap<String, Column>,
}

impl Storage {
    /// Storage name set by `entity`
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Primary column name
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }
}

/// Row of columns returned by schema lookups
pub type Row<'a> = Vec<&'a Column>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn string() -> Format {
        Format::String {
            min: None,
            max: None,
        }
    }

    #[test]
    fn test_external_name_falls_back() {
        let mut column = Column::new("email", ColumnKind::Real);
        assert_eq!(column.external_name(), "email");
        column.alias = Some("e_mail".into());
        assert_eq!(column.external_name(), "e_mail");
    }

    #[test]
    fn test_structure_prefers_first_structural_format() {
        let mut column = Column::new("tags", ColumnKind::Real);
        column.validation.add_format(Format::Null, false);
        column.validation.add_format(
            Format::Array {
                items: Items::Format(Box::new(string())),
                unique: false,
                min: None,
                max: None,
            },
            false,
        );
        column.validation.add_format(
            Format::Object {
                model: ModelRef::Named("Tag".into()),
            },
            false,
        );
        assert!(matches!(column.structure(), Structure::Array { .. }));
        assert!(column.model().is_none());
    }

    #[test]
    fn test_caster_applies_direction() {
        let mut column = Column::new("n", ColumnKind::Real);
        column.caster = Some(Caster::new(|value, direction| match direction {
            Direction::Input => json!(format!("in:{}", value)),
            _ => value,
        }));
        assert_eq!(column.cast(json!(1), Direction::Input), json!("in:1"));
        assert_eq!(column.cast(json!(1), Direction::Output), json!(1));
    }

    #[test]
    fn test_multiple_only_for_joins() {
        let real = Column::new("a", ColumnKind::Real);
        assert!(!real.multiple());

        let join = Join {
            model: ModelRef::Named("B".into()),
            local: "b_ids".into(),
            foreign: "id".into(),
            multiple: true,
            all: false,
            query: None,
        };
        let virtual_column = Column::new("b", ColumnKind::Virtual(join));
        assert!(virtual_column.multiple());
        assert!(virtual_column.is_virtual());
    }
}
