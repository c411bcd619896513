//! Schema registry: declaration phase
//!
//! Entity types are declared into an arena and decorated column by column.
//! `freeze` consumes the registry and produces the immutable `Schema` used by
//! every lookup and materialization.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use super::errors::{SchemaError, SchemaResult};
use super::format::{Format, FormatKind, Items};
use super::snapshot::Schema;
use super::types::{Caster, Column, ColumnKind, Join, ModelId, ModelRef, Storage};
use crate::observability::{log_event_with_fields, Event};
use crate::query::Filter;

/// Declared entity type
#[derive(Debug, Clone)]
pub(crate) struct EntityType {
    pub(crate) type_name: String,
    pub(crate) parent: Option<ModelId>,
    pub(crate) storage: Option<Storage>,
}

impl EntityType {
    /// Storage name if set, otherwise the type name
    pub(crate) fn label(&self) -> &str {
        self.storage
            .as_ref()
            .and_then(|storage| storage.name.as_deref())
            .unwrap_or(&self.type_name)
    }
}

/// Walks a model and its ancestors, child first
///
/// The walk is bounded by the arena size so a malformed parent link can never
/// loop forever.
pub(crate) fn ancestry(types: &[EntityType], model: ModelId) -> Vec<&EntityType> {
    let mut chain = Vec::new();
    let mut current = Some(model);
    while let Some(id) = current {
        if chain.len() >= types.len() {
            break;
        }
        match types.get(id.0) {
            Some(entity_type) => {
                chain.push(entity_type);
                current = entity_type.parent;
            }
            None => break,
        }
    }
    chain
}

/// Mutable registry used while declaring entities
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: Vec<EntityType>,
    by_name: HashMap<String, ModelId>,
}

impl SchemaRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an entity type by name
    ///
    /// Declaring the same name twice returns the existing handle.
    pub fn declare(&mut self, type_name: impl Into<String>) -> ModelId {
        let type_name = type_name.into();
        if let Some(id) = self.by_name.get(&type_name) {
            return *id;
        }
        let id = ModelId(self.types.len());
        self.types.push(EntityType {
            type_name: type_name.clone(),
            parent: None,
            storage: None,
        });
        self.by_name.insert(type_name, id);
        id
    }

    /// Declares an entity type inheriting the columns of `parent`
    pub fn declare_extending(
        &mut self,
        type_name: impl Into<String>,
        parent: ModelId,
    ) -> SchemaResult<ModelId> {
        if parent.0 >= self.types.len() {
            return Err(SchemaError::invalid_model(parent.to_string()));
        }
        let id = self.declare(type_name);
        if id != parent {
            self.types[id.0].parent = Some(parent);
        }
        Ok(id)
    }

    /// Declares an entity type and names its storage in one step
    pub fn define(
        &mut self,
        type_name: impl Into<String>,
        storage_name: impl Into<String>,
    ) -> SchemaResult<ModelId> {
        let id = self.declare(type_name);
        self.entity(id, storage_name)?;
        Ok(id)
    }

    /// Sets the storage name of an entity
    pub fn entity(&mut self, model: ModelId, storage_name: impl Into<String>) -> SchemaResult<()> {
        let entity_type = self.type_mut(model)?;
        entity_type
            .storage
            .get_or_insert_with(Storage::default)
            .name = Some(storage_name.into());
        Ok(())
    }

    /// Starts decorating a real column, creating it on first use
    pub fn column(&mut self, model: ModelId, name: &str) -> SchemaResult<ColumnDecorator<'_>> {
        let entity_type = self.type_mut(model)?;
        let label = entity_type.label().to_string();
        let storage = entity_type.storage.get_or_insert_with(Storage::default);
        storage
            .columns
            .entry(name.to_string())
            .or_insert_with(|| Column::new(name, ColumnKind::Real));

        Ok(ColumnDecorator {
            storage,
            label,
            name: name.to_string(),
        })
    }

    /// Declares a virtual column loading the first entity whose `foreign`
    /// column matches the local column
    ///
    /// When the local column holds an array the join becomes `multiple` and
    /// the virtual column an array of entities.
    pub fn join(
        &mut self,
        model: ModelId,
        name: &str,
        foreign_model: impl Into<ModelRef>,
        local: &str,
        foreign: &str,
    ) -> SchemaResult<ColumnDecorator<'_>> {
        self.declare_join(model, name, foreign_model.into(), local, foreign, false)
    }

    /// Declares a virtual column loading every matching entity
    pub fn join_all(
        &mut self,
        model: ModelId,
        name: &str,
        foreign_model: impl Into<ModelRef>,
        local: &str,
        foreign: &str,
    ) -> SchemaResult<ColumnDecorator<'_>> {
        self.declare_join(model, name, foreign_model.into(), local, foreign, true)
    }

    fn declare_join(
        &mut self,
        model: ModelId,
        name: &str,
        foreign_model: ModelRef,
        local: &str,
        foreign: &str,
        all: bool,
    ) -> SchemaResult<ColumnDecorator<'_>> {
        let multiple = {
            let chain = ancestry(&self.types, model);
            let label = chain
                .first()
                .map(|t| t.label().to_string())
                .ok_or_else(|| SchemaError::invalid_model(model.to_string()))?;
            let local_column = chain
                .iter()
                .filter_map(|t| t.storage.as_ref())
                .find_map(|storage| storage.columns.get(local))
                .filter(|column| column.is_real())
                .ok_or_else(|| SchemaError::column_not_found(&label, local))?;
            local_column.has_format(FormatKind::Array)
        };

        let entity_type = self.type_mut(model)?;
        let label = entity_type.label().to_string();
        let storage = entity_type.storage.get_or_insert_with(Storage::default);

        if storage.columns.get(name).map_or(false, Column::is_real) {
            return Err(SchemaError::column_kind_conflict(
                &label,
                name,
                "a real column cannot become a join",
            ));
        }

        let items = Items::Entity(foreign_model.clone());
        let format = if all || multiple {
            Format::Array {
                items,
                unique: false,
                min: None,
                max: None,
            }
        } else {
            Format::Object {
                model: foreign_model.clone(),
            }
        };

        let mut column = Column::new(
            name,
            ColumnKind::Virtual(Join {
                model: foreign_model,
                local: local.to_string(),
                foreign: foreign.to_string(),
                multiple,
                all,
                query: None,
            }),
        );
        if let Some(previous) = storage.columns.remove(name) {
            column.alias = previous.alias;
            column.required = previous.required;
            column.hidden = previous.hidden;
            column.read_only = previous.read_only;
            column.write_only = previous.write_only;
            column.caster = previous.caster;
        }
        column.validation.add_format(format, column.required);
        storage.columns.insert(name.to_string(), column);

        Ok(ColumnDecorator {
            storage,
            label,
            name: name.to_string(),
        })
    }

    /// Returns the handle of a declared type
    pub fn find(&self, type_name: &str) -> Option<ModelId> {
        self.by_name.get(type_name).copied()
    }

    /// Number of declared types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Ends the declaration phase
    ///
    /// Every named model reference must resolve to a declared type.
    pub fn freeze(self) -> SchemaResult<Schema> {
        for entity_type in &self.types {
            let Some(storage) = entity_type.storage.as_ref() else {
                continue;
            };
            for column in storage.columns.values() {
                let join_model = column.join().map(|join| &join.model);
                for model in column.model().into_iter().chain(join_model) {
                    if let ModelRef::Named(name) = model {
                        if !self.by_name.contains_key(name) {
                            return Err(SchemaError::invalid_model(name.clone()));
                        }
                    }
                }
            }
        }

        let entities = self
            .types
            .iter()
            .filter(|t| t.storage.is_some())
            .count()
            .to_string();
        let types = self.types.len().to_string();
        log_event_with_fields(
            Event::SchemaFrozen,
            &[("entities", entities.as_str()), ("types", types.as_str())],
        );

        Ok(Schema::new(self.types, self.by_name))
    }

    fn type_mut(&mut self, model: ModelId) -> SchemaResult<&mut EntityType> {
        self.types
            .get_mut(model.0)
            .ok_or_else(|| SchemaError::invalid_model(model.to_string()))
    }
}

/// Chainable decoration of a single column
///
/// Each method merges into the existing column record.
pub struct ColumnDecorator<'r> {
    storage: &'r mut Storage,
    label: String,
    name: String,
}

impl<'r> ColumnDecorator<'r> {
    fn column_mut(&mut self) -> SchemaResult<&mut Column> {
        self.storage
            .columns
            .get_mut(&self.name)
            .ok_or_else(|| SchemaError::column_not_found(&self.label, &self.name))
    }

    /// External name used by aliased normalization
    pub fn alias(mut self, alias: impl Into<String>) -> SchemaResult<Self> {
        self.column_mut()?.alias = Some(alias.into());
        Ok(self)
    }

    /// Column must be present in strict modes; absence no longer validates
    pub fn required(mut self) -> SchemaResult<Self> {
        let column = self.column_mut()?;
        column.required = true;
        column.validation.require();
        Ok(self)
    }

    /// Omitted from normalization unless hidden columns are revealed
    pub fn hidden(mut self) -> SchemaResult<Self> {
        self.column_mut()?.hidden = true;
        Ok(self)
    }

    /// Callers may not supply this column on input
    pub fn read_only(mut self) -> SchemaResult<Self> {
        let (label, name) = (self.label.clone(), self.name.clone());
        let column = self.column_mut()?;
        if column.write_only {
            return Err(SchemaError::conflicting_access_modifier(
                &label, &name, "read-only",
            ));
        }
        column.read_only = true;
        Ok(self)
    }

    /// Storage may never return this column on output
    pub fn write_only(mut self) -> SchemaResult<Self> {
        let (label, name) = (self.label.clone(), self.name.clone());
        let column = self.column_mut()?;
        if column.read_only {
            return Err(SchemaError::conflicting_access_modifier(
                &label, &name, "write-only",
            ));
        }
        column.write_only = true;
        Ok(self)
    }

    /// Marks the column as the storage's primary key
    pub fn primary(mut self) -> SchemaResult<Self> {
        if self.column_mut()?.is_virtual() {
            return Err(SchemaError::column_kind_conflict(
                &self.label,
                &self.name,
                "a join cannot be primary",
            ));
        }
        match self.storage.primary.as_deref() {
            Some(existing) if existing != self.name => {
                return Err(SchemaError::duplicate_primary_column(
                    &self.label,
                    existing,
                    &self.name,
                ));
            }
            _ => {}
        }
        self.storage.primary = Some(self.name.clone());
        Ok(self)
    }

    /// Value hook applied in every direction
    pub fn caster(mut self, caster: Caster) -> SchemaResult<Self> {
        self.column_mut()?.caster = Some(caster);
        Ok(self)
    }

    /// Pre-filter applied to the foreign storage of a join
    pub fn query(mut self, filter: Filter) -> SchemaResult<Self> {
        let (label, name) = (self.label.clone(), self.name.clone());
        match &mut self.column_mut()?.kind {
            ColumnKind::Virtual(join) => join.query = Some(filter),
            ColumnKind::Real => {
                return Err(SchemaError::column_kind_conflict(
                    &label,
                    &name,
                    "only joins accept a query",
                ))
            }
        }
        Ok(self)
    }

    /// Adds an accepted format
    ///
    /// Virtual columns take their structure from the join and only accept
    /// an additional `Null`.
    pub fn format(mut self, format: Format) -> SchemaResult<Self> {
        let (label, name) = (self.label.clone(), self.name.clone());
        let column = self.column_mut()?;
        if column.is_virtual() && !matches!(format, Format::Null) {
            return Err(SchemaError::column_kind_conflict(
                &label,
                &name,
                format!("a join cannot accept the {} format", format.kind()),
            ));
        }
        let required = column.required;
        column.validation.add_format(format, required);
        Ok(self)
    }

    pub fn id(self) -> SchemaResult<Self> {
        self.format(Format::Id)
    }

    pub fn null(self) -> SchemaResult<Self> {
        self.format(Format::Null)
    }

    pub fn binary(self) -> SchemaResult<Self> {
        self.format(Format::Binary)
    }

    pub fn boolean(self) -> SchemaResult<Self> {
        self.format(Format::Boolean)
    }

    pub fn integer(self, min: Option<i64>, max: Option<i64>) -> SchemaResult<Self> {
        self.format(Format::Integer { min, max })
    }

    pub fn decimal(self, min: Option<f64>, max: Option<f64>) -> SchemaResult<Self> {
        self.format(Format::Decimal { min, max })
    }

    pub fn number(self, min: Option<f64>, max: Option<f64>) -> SchemaResult<Self> {
        self.format(Format::Number { min, max })
    }

    pub fn string(self, min: Option<usize>, max: Option<usize>) -> SchemaResult<Self> {
        self.format(Format::String { min, max })
    }

    pub fn enumeration<I, S>(self, values: I) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.format(Format::Enumeration(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn pattern(self, regex: Regex) -> SchemaResult<Self> {
        self.format(Format::Pattern(regex))
    }

    pub fn timestamp(
        self,
        min: Option<DateTime<Utc>>,
        max: Option<DateTime<Utc>>,
    ) -> SchemaResult<Self> {
        self.format(Format::Timestamp { min, max })
    }

    pub fn date(self, min: Option<NaiveDate>, max: Option<NaiveDate>) -> SchemaResult<Self> {
        self.format(Format::Date { min, max })
    }

    /// Array with explicit item rule and bounds
    pub fn array(
        self,
        items: Items,
        unique: bool,
        min: Option<usize>,
        max: Option<usize>,
    ) -> SchemaResult<Self> {
        self.format(Format::Array {
            items,
            unique,
            min,
            max,
        })
    }

    /// Array of nested entities
    pub fn array_of(self, model: impl Into<ModelRef>) -> SchemaResult<Self> {
        self.array(Items::Entity(model.into()), false, None, None)
    }

    /// Map with an explicit value rule
    pub fn map(self, values: Items) -> SchemaResult<Self> {
        self.format(Format::Map { values })
    }

    /// Map of nested entities
    pub fn map_of(self, model: impl Into<ModelRef>) -> SchemaResult<Self> {
        self.map(Items::Entity(model.into()))
    }

    /// Single nested entity
    pub fn object(self, model: impl Into<ModelRef>) -> SchemaResult<Self> {
        self.format(Format::Object {
            model: model.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::errors::SchemaErrorCode;

    #[test]
    fn test_declare_is_idempotent() {
        let mut registry = SchemaRegistry::new();
        let a = registry.declare("User");
        let b = registry.declare("User");
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_redecoration_merges() {
        let mut registry = SchemaRegistry::new();
        let user = registry.define("User", "users").unwrap();
        registry.column(user, "name").unwrap().string(None, None).unwrap();
        registry.column(user, "name").unwrap().null().unwrap().required().unwrap();

        let schema = registry.freeze().unwrap();
        let column = schema.real_column(user, "name").unwrap();
        assert!(column.is_required());
        assert!(column.has_format(FormatKind::String));
        assert!(column.has_format(FormatKind::Null));
    }

    #[test]
    fn test_read_only_after_write_only_conflicts() {
        let mut registry = SchemaRegistry::new();
        let user = registry.define("User", "users").unwrap();
        let err = registry
            .column(user, "password")
            .unwrap()
            .write_only()
            .unwrap()
            .read_only()
            .err()
            .unwrap();
        assert_eq!(err.code(), SchemaErrorCode::ConflictingAccessModifier);

        let err = registry
            .column(user, "created")
            .unwrap()
            .read_only()
            .unwrap()
            .write_only()
            .err()
            .unwrap();
        assert_eq!(err.code(), SchemaErrorCode::ConflictingAccessModifier);
    }

    #[test]
    fn test_single_primary_column() {
        let mut registry = SchemaRegistry::new();
        let user = registry.define("User", "users").unwrap();
        registry.column(user, "id").unwrap().id().unwrap().primary().unwrap();
        registry.column(user, "id").unwrap().primary().unwrap();
        let err = registry
            .column(user, "other")
            .unwrap()
            .primary()
            .err()
            .unwrap();
        assert_eq!(err.code(), SchemaErrorCode::DuplicatePrimaryColumn);
    }

    #[test]
    fn test_join_cannot_be_primary() {
        let mut registry = SchemaRegistry::new();
        let user = registry.define("User", "users").unwrap();
        let post = registry.define("Post", "posts").unwrap();
        registry.column(post, "author_id").unwrap().id().unwrap();
        let err = registry
            .join(post, "author", user, "author_id", "id")
            .unwrap()
            .primary()
            .err()
            .unwrap();
        assert_eq!(err.code(), SchemaErrorCode::ColumnKindConflict);
        assert_eq!(err.columns(), ["author"]);

        let schema = registry.freeze().unwrap();
        assert_eq!(
            schema.primary_column(post).unwrap_err().code(),
            SchemaErrorCode::NoPrimaryColumn
        );
    }

    #[test]
    fn test_join_requires_local_column() {
        let mut registry = SchemaRegistry::new();
        let post = registry.define("Post", "posts").unwrap();
        let user = registry.define("User", "users").unwrap();
        let err = registry
            .join(post, "author", user, "author_id", "id")
            .err()
            .unwrap();
        assert_eq!(err.code(), SchemaErrorCode::ColumnNotFound);
    }

    #[test]
    fn test_join_over_array_key_is_multiple() {
        let mut registry = SchemaRegistry::new();
        let post = registry.define("Post", "posts").unwrap();
        let tag = registry.define("Tag", "tags").unwrap();
        registry
            .column(post, "tag_ids")
            .unwrap()
            .array(Items::Format(Box::new(Format::Id)), false, None, None)
            .unwrap();
        registry.join(post, "tags", tag, "tag_ids", "id").unwrap();

        let schema = registry.freeze().unwrap();
        let row = schema.virtual_row(post, &[] as &[&str]).unwrap();
        assert_eq!(row.len(), 1);
        assert!(row[0].multiple());
        assert!(row[0].has_format(FormatKind::Array));
    }

    #[test]
    fn test_real_and_virtual_names_are_exclusive() {
        let mut registry = SchemaRegistry::new();
        let post = registry.define("Post", "posts").unwrap();
        let user = registry.define("User", "users").unwrap();
        registry.column(post, "author_id").unwrap().id().unwrap();
        registry.column(post, "author").unwrap().string(None, None).unwrap();
        let err = registry
            .join(post, "author", user, "author_id", "id")
            .err()
            .unwrap();
        assert_eq!(err.code(), SchemaErrorCode::ColumnKindConflict);

        registry.join(post, "writer", user, "author_id", "id").unwrap();
        let err = registry
            .column(post, "writer")
            .unwrap()
            .string(None, None)
            .err()
            .unwrap();
        assert_eq!(err.code(), SchemaErrorCode::ColumnKindConflict);
    }

    #[test]
    fn test_freeze_rejects_unresolved_reference() {
        let mut registry = SchemaRegistry::new();
        let user = registry.define("User", "users").unwrap();
        registry.column(user, "address").unwrap().object("Address").unwrap();
        let err = registry.freeze().err().unwrap();
        assert_eq!(err.code(), SchemaErrorCode::InvalidModel);
    }

    #[test]
    fn test_extending_unknown_parent() {
        let mut registry = SchemaRegistry::new();
        let err = registry.declare_extending("Admin", ModelId(9)).err().unwrap();
        assert_eq!(err.code(), SchemaErrorCode::InvalidModel);
    }
}
