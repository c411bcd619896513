//! Frozen schema: lookup phase
//!
//! A `Schema` is immutable and `Send + Sync`. Every lookup walks the model's
//! parent links explicitly; a child column shadows a parent column of the
//! same name.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use super::errors::{SchemaError, SchemaResult};
use super::projection::{is_visible, nested_fields};
use super::registry::{ancestry, EntityType};
use super::types::{Column, ModelId, ModelRef, Row, Storage};
use crate::observability::{log_event_with_fields, Event};
use crate::query::Filter;

/// Join description handed to drivers for one virtual column
#[derive(Debug, Clone, PartialEq)]
pub struct JoinDescriptor {
    /// Virtual column receiving the joined entities
    pub virtual_name: String,
    /// Storage name of the foreign entity
    pub storage: String,
    /// Local column holding the key
    pub local: String,
    /// Foreign column matched against the key
    pub foreign: String,
    /// Foreign columns to load; write-only columns are never selected
    pub columns: Vec<String>,
    /// Local key is array valued
    pub multiple: bool,
    /// Load every match
    pub all: bool,
    /// Pre-filter for the foreign storage
    pub query: Option<Filter>,
}

/// Immutable schema snapshot
#[derive(Debug, Clone)]
pub struct Schema {
    types: Vec<EntityType>,
    by_name: HashMap<String, ModelId>,
}

impl Schema {
    pub(crate) fn new(types: Vec<EntityType>, by_name: HashMap<String, ModelId>) -> Self {
        Self { types, by_name }
    }

    fn storages(&self, model: ModelId) -> Vec<&Storage> {
        ancestry(&self.types, model)
            .into_iter()
            .filter_map(|t| t.storage.as_ref())
            .collect()
    }

    /// Storages of the chain, failing when none is registered
    fn registered(&self, model: ModelId) -> SchemaResult<Vec<&Storage>> {
        let storages = self.storages(model);
        if storages.is_empty() {
            return Err(SchemaError::invalid_model(self.label(model)));
        }
        Ok(storages)
    }

    /// True if the model or an ancestor has registered storage
    pub fn is_entity(&self, model: ModelId) -> bool {
        !self.storages(model).is_empty()
    }

    /// Declared type name
    pub fn type_name(&self, model: ModelId) -> Option<&str> {
        self.types.get(model.0).map(|t| t.type_name.as_str())
    }

    /// Name used in error messages: storage name, else type name
    pub fn label(&self, model: ModelId) -> String {
        self.storages(model)
            .into_iter()
            .find_map(|storage| storage.name.clone())
            .or_else(|| self.type_name(model).map(str::to_string))
            .unwrap_or_else(|| model.to_string())
    }

    /// Storage name of the model or its nearest named ancestor
    pub fn storage_name(&self, model: ModelId) -> SchemaResult<&str> {
        self.storages(model)
            .into_iter()
            .find_map(|storage| storage.name.as_deref())
            .ok_or_else(|| SchemaError::invalid_model(self.label(model)))
    }

    fn row_where<S, P>(&self, model: ModelId, fields: &[S], keep: P) -> SchemaResult<Row<'_>>
    where
        S: AsRef<str>,
        P: Fn(&Column) -> bool,
    {
        let mut columns: BTreeMap<&str, &Column> = BTreeMap::new();
        for storage in self.registered(model)? {
            for column in storage.columns.values() {
                columns.entry(column.name()).or_insert(column);
            }
        }
        Ok(columns
            .into_values()
            .filter(|column| keep(*column) && is_visible(column.name(), fields))
            .collect())
    }

    /// Real columns visible under the projection
    pub fn real_row<S: AsRef<str>>(&self, model: ModelId, fields: &[S]) -> SchemaResult<Row<'_>> {
        self.row_where(model, fields, Column::is_real)
    }

    /// Virtual columns visible under the projection
    pub fn virtual_row<S: AsRef<str>>(
        &self,
        model: ModelId,
        fields: &[S],
    ) -> SchemaResult<Row<'_>> {
        self.row_where(model, fields, Column::is_virtual)
    }

    /// Real and virtual columns visible under the projection
    pub fn rows<S: AsRef<str>>(&self, model: ModelId, fields: &[S]) -> SchemaResult<Row<'_>> {
        self.row_where(model, fields, |_| true)
    }

    /// Real column by name
    pub fn real_column(&self, model: ModelId, name: &str) -> SchemaResult<&Column> {
        self.registered(model)?
            .into_iter()
            .find_map(|storage| storage.columns.get(name))
            .filter(|column| column.is_real())
            .ok_or_else(|| SchemaError::column_not_found(&self.label(model), name))
    }

    /// Primary column of the model or its nearest ancestor declaring one
    pub fn primary_column(&self, model: ModelId) -> SchemaResult<&Column> {
        let storages = self.registered(model)?;
        let primary = storages
            .iter()
            .find_map(|storage| storage.primary.as_deref())
            .ok_or_else(|| SchemaError::no_primary_column(&self.label(model)))?;
        self.real_column(model, primary)
    }

    /// Resolves a model reference to a declared type
    pub fn try_entity_model(&self, model: &ModelRef) -> Option<ModelId> {
        match model {
            ModelRef::Id(id) if id.0 < self.types.len() => Some(*id),
            ModelRef::Id(_) => None,
            ModelRef::Named(name) => self.by_name.get(name).copied(),
        }
    }

    /// Resolves a model reference to a registered entity
    pub fn entity_model(&self, model: &ModelRef) -> SchemaResult<ModelId> {
        self.try_entity_model(model)
            .filter(|id| self.is_entity(*id))
            .ok_or_else(|| SchemaError::invalid_model(model.to_string()))
    }

    /// Handle of a declared type by name
    pub fn find(&self, type_name: &str) -> Option<ModelId> {
        self.by_name.get(type_name).copied()
    }

    /// Every declared type
    pub fn models(&self) -> impl Iterator<Item = ModelId> + '_ {
        (0..self.types.len()).map(ModelId)
    }

    /// Names of the real, non-write-only columns visible under the projection
    pub fn readable_columns<S: AsRef<str>>(
        &self,
        model: ModelId,
        fields: &[S],
    ) -> SchemaResult<Vec<String>> {
        Ok(self
            .real_row(model, fields)?
            .into_iter()
            .filter(|column| !column.is_write_only())
            .map(|column| column.name().to_string())
            .collect())
    }

    /// Join descriptors for the virtual columns visible under the projection
    pub fn joins<S: AsRef<str>>(
        &self,
        model: ModelId,
        fields: &[S],
    ) -> SchemaResult<Vec<JoinDescriptor>> {
        let mut joins = Vec::new();
        for column in self.virtual_row(model, fields)? {
            let Some(join) = column.join() else {
                continue;
            };
            let foreign = self.entity_model(&join.model)?;
            let nested = nested_fields(column.name(), fields);
            joins.push(JoinDescriptor {
                virtual_name: column.name().to_string(),
                storage: self.storage_name(foreign)?.to_string(),
                local: join.local.clone(),
                foreign: join.foreign.clone(),
                columns: self.readable_columns(foreign, &nested)?,
                multiple: join.multiple,
                all: join.all,
                query: join.query.clone(),
            });
        }
        Ok(joins)
    }
}

static GLOBAL: OnceLock<Schema> = OnceLock::new();

/// Publishes a schema as the process-wide snapshot
///
/// Only one schema may be installed per process.
pub fn install(schema: Schema) -> SchemaResult<&'static Schema> {
    let types = schema.types.len().to_string();
    GLOBAL
        .set(schema)
        .map_err(|_| SchemaError::already_installed())?;
    log_event_with_fields(Event::SchemaInstalled, &[("types", types.as_str())]);
    GLOBAL.get().ok_or_else(SchemaError::already_installed)
}

/// The process-wide schema, if installed
pub fn global() -> Option<&'static Schema> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::errors::SchemaErrorCode;
    use crate::schema::registry::SchemaRegistry;

    const ALL: [&str; 0] = [];

    fn user_schema() -> (Schema, ModelId, ModelId, ModelId) {
        let mut registry = SchemaRegistry::new();
        let user = registry.define("User", "users").unwrap();
        let admin = registry.declare_extending("Admin", user).unwrap();
        let address = registry.declare("Address");

        registry.column(user, "id").unwrap().id().unwrap().primary().unwrap();
        registry.column(user, "name").unwrap().string(None, None).unwrap();
        registry.column(user, "address").unwrap().object(address).unwrap();
        registry.column(address, "city").unwrap().string(None, None).unwrap();
        registry.column(address, "zip").unwrap().string(None, None).unwrap();
        registry.column(admin, "name").unwrap().string(Some(3), None).unwrap().required().unwrap();
        registry.column(admin, "level").unwrap().integer(Some(1), None).unwrap();

        (registry.freeze().unwrap(), user, admin, address)
    }

    #[test]
    fn test_is_entity_and_storage_name() {
        let (schema, user, admin, address) = user_schema();
        assert!(schema.is_entity(user));
        assert!(schema.is_entity(admin));
        assert!(schema.is_entity(address));
        assert_eq!(schema.storage_name(admin).unwrap(), "users");

        let err = schema.storage_name(address).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::InvalidModel);
        assert!(!schema.is_entity(ModelId(42)));
    }

    #[test]
    fn test_child_shadows_parent() {
        let (schema, user, admin, _) = user_schema();
        assert!(!schema.real_column(user, "name").unwrap().is_required());
        assert!(schema.real_column(admin, "name").unwrap().is_required());

        let names: Vec<&str> = schema
            .real_row(admin, &ALL)
            .unwrap()
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["address", "id", "level", "name"]);
    }

    #[test]
    fn test_projection_rows() {
        let (schema, user, _, address) = user_schema();
        let row = schema.real_row(user, &["address.city"]).unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row[0].name(), "address");

        let nested = nested_fields("address", &["address.city"]);
        let row = schema.real_row(address, &nested).unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row[0].name(), "city");
    }

    #[test]
    fn test_unregistered_model_fails() {
        let mut registry = SchemaRegistry::new();
        let ghost = registry.declare("Ghost");
        let schema = registry.freeze().unwrap();
        let err = schema.real_row(ghost, &ALL).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::InvalidModel);
    }

    #[test]
    fn test_point_lookups() {
        let (schema, user, admin, address) = user_schema();
        assert_eq!(schema.primary_column(admin).unwrap().name(), "id");
        assert_eq!(
            schema.primary_column(address).unwrap_err().code(),
            SchemaErrorCode::NoPrimaryColumn
        );
        assert_eq!(
            schema.real_column(user, "missing").unwrap_err().code(),
            SchemaErrorCode::ColumnNotFound
        );
    }

    #[test]
    fn test_join_descriptors_skip_write_only() {
        let mut registry = SchemaRegistry::new();
        let post = registry.define("Post", "posts").unwrap();
        let user = registry.define("User", "users").unwrap();
        registry.column(user, "id").unwrap().id().unwrap().primary().unwrap();
        registry.column(user, "name").unwrap().string(None, None).unwrap();
        registry.column(user, "password").unwrap().string(None, None).unwrap().write_only().unwrap();
        registry.column(post, "author_id").unwrap().id().unwrap();
        registry.join(post, "author", user, "author_id", "id").unwrap();
        let schema = registry.freeze().unwrap();

        let joins = schema.joins(post, &ALL).unwrap();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].storage, "users");
        assert_eq!(joins[0].columns, vec!["id", "name"]);
        assert!(!joins[0].multiple);

        let joins = schema.joins(post, &["author.name"]).unwrap();
        assert_eq!(joins[0].columns, vec!["name"]);
        assert!(schema.joins(post, &["author_id"]).unwrap().is_empty());
    }

    #[test]
    fn test_model_resolution() {
        let (schema, user, _, _) = user_schema();
        assert_eq!(schema.try_entity_model(&ModelRef::from("User")), Some(user));
        assert_eq!(schema.try_entity_model(&ModelRef::from("Nope")), None);
        assert_eq!(schema.try_entity_model(&ModelRef::Id(ModelId(99))), None);
        assert!(schema.entity_model(&ModelRef::from("Nope")).is_err());
    }
}
