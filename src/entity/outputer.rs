//! Outputer: builds entities handed back to callers from storage data
//!
//! Walks real and virtual columns under a field projection. Write-only
//! columns must never come back from storage. Nested entities left with no
//! populated column are pruned unless their parent column is required and
//! real.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{shape_name, Entity, ROOT};
use crate::config::MapperConfig;
use crate::schema::{
    nested_fields, Column, Direction, FormatKind, Items, ModelId, Schema, SchemaError,
    SchemaResult, Structure,
};

/// Output materializer
pub struct Outputer<'a> {
    schema: &'a Schema,
    config: MapperConfig,
}

impl<'a> Outputer<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self::with_config(schema, MapperConfig::default())
    }

    pub fn with_config(schema: &'a Schema, config: MapperConfig) -> Self {
        Self { schema, config }
    }

    /// Builds an entity from a stored entry, restricted to `fields`
    pub fn create<S: AsRef<str>>(
        &self,
        model: ModelId,
        entry: &Value,
        fields: &[S],
    ) -> SchemaResult<Entity> {
        self.create_root(model, entry, fields, false)
    }

    /// Like `create`, but reports every missing required column at once
    pub fn create_full<S: AsRef<str>>(
        &self,
        model: ModelId,
        entry: &Value,
        fields: &[S],
    ) -> SchemaResult<Entity> {
        self.create_root(model, entry, fields, true)
    }

    pub fn create_array<S: AsRef<str>>(
        &self,
        model: ModelId,
        entries: &[Value],
        fields: &[S],
    ) -> SchemaResult<Vec<Entity>> {
        entries
            .iter()
            .map(|entry| self.create_root(model, entry, fields, false))
            .collect()
    }

    pub fn create_full_array<S: AsRef<str>>(
        &self,
        model: ModelId,
        entries: &[Value],
        fields: &[S],
    ) -> SchemaResult<Vec<Entity>> {
        entries
            .iter()
            .map(|entry| self.create_root(model, entry, fields, true))
            .collect()
    }

    pub fn create_map<S: AsRef<str>>(
        &self,
        model: ModelId,
        entries: &Map<String, Value>,
        fields: &[S],
    ) -> SchemaResult<BTreeMap<String, Entity>> {
        entries
            .iter()
            .map(|(key, entry)| Ok((key.clone(), self.create_root(model, entry, fields, false)?)))
            .collect()
    }

    pub fn create_full_map<S: AsRef<str>>(
        &self,
        model: ModelId,
        entries: &Map<String, Value>,
        fields: &[S],
    ) -> SchemaResult<BTreeMap<String, Entity>> {
        entries
            .iter()
            .map(|(key, entry)| Ok((key.clone(), self.create_root(model, entry, fields, true)?)))
            .collect()
    }

    fn create_root<S: AsRef<str>>(
        &self,
        model: ModelId,
        entry: &Value,
        fields: &[S],
        full: bool,
    ) -> SchemaResult<Entity> {
        let entry = entry.as_object().ok_or_else(|| {
            SchemaError::type_mismatch(&self.schema.label(model), ROOT, "object", shape_name(entry))
        })?;
        let entity = self.create_entity(model, entry, fields, true, full, 0)?;
        Ok(entity.unwrap_or_default())
    }

    /// Returns `None` when the entity is empty and not wanted
    fn create_entity<S: AsRef<str>>(
        &self,
        model: ModelId,
        entry: &Map<String, Value>,
        fields: &[S],
        wanted: bool,
        full: bool,
        depth: usize,
    ) -> SchemaResult<Option<Entity>> {
        if depth > self.config.max_depth {
            return Err(SchemaError::max_depth_exceeded(
                &self.schema.label(model),
                self.config.max_depth,
            ));
        }

        let mut entity = Entity::new();
        let mut missing = Vec::new();
        for column in self.schema.rows(model, fields)? {
            match entry.get(column.name()) {
                None => {
                    if full && column.is_required() && !column.is_write_only() {
                        missing.push(column.name().to_string());
                    }
                }
                Some(_) if column.is_write_only() => {
                    return Err(SchemaError::write_only_violation(
                        &self.schema.label(model),
                        column.name(),
                    ));
                }
                Some(value) => {
                    let nested = nested_fields(column.name(), fields);
                    if let Some(value) =
                        self.create_value(model, column, value, &nested, full, depth)?
                    {
                        entity.insert(column.name().to_string(), value);
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(SchemaError::missing_required_columns(
                &self.schema.label(model),
                missing,
            ));
        }
        if entity.is_empty() && !wanted {
            return Ok(None);
        }
        Ok(Some(entity))
    }

    fn create_value(
        &self,
        model: ModelId,
        column: &Column,
        value: &Value,
        fields: &[String],
        full: bool,
        depth: usize,
    ) -> SchemaResult<Option<Value>> {
        if value.is_null() && column.has_format(FormatKind::Null) {
            return Ok(Some(column.cast(Value::Null, Direction::Output)));
        }

        let mismatch = |expected: &str| {
            SchemaError::type_mismatch(
                &self.schema.label(model),
                column.name(),
                expected,
                shape_name(value),
            )
        };

        let converted = match column.structure() {
            Structure::Scalar => value.clone(),
            Structure::Array { items } => {
                let elements = value.as_array().ok_or_else(|| mismatch("array"))?;
                Value::Array(self.create_array_entity(
                    model,
                    column,
                    items,
                    elements,
                    fields,
                    column.multiple(),
                    full,
                    depth,
                )?)
            }
            Structure::Map { values } => {
                let entries = value.as_object().ok_or_else(|| mismatch("map"))?;
                Value::Object(
                    self.create_map_entity(model, column, values, entries, fields, full, depth)?,
                )
            }
            Structure::Object { model: nested } => {
                let nested = self.schema.entity_model(nested)?;
                let entry = value.as_object().ok_or_else(|| mismatch("object"))?;
                let wanted = column.is_required() && column.is_real();
                match self.create_entity(nested, entry, fields, wanted, full, depth + 1)? {
                    Some(entity) => Value::Object(entity),
                    None => return Ok(None),
                }
            }
        };

        Ok(Some(column.cast(converted, Direction::Output)))
    }

    #[allow(clippy::too_many_arguments)]
    fn create_array_entity(
        &self,
        model: ModelId,
        column: &Column,
        items: &Items,
        elements: &[Value],
        fields: &[String],
        multiple: bool,
        full: bool,
        depth: usize,
    ) -> SchemaResult<Vec<Value>> {
        let Some(nested) = items.model() else {
            return Ok(elements.to_vec());
        };
        let nested = self.schema.entity_model(nested)?;

        elements
            .iter()
            .map(|element| match element {
                Value::Object(entry) => {
                    let entity = self.create_entity(nested, entry, fields, true, full, depth + 1)?;
                    Ok(Value::Object(entity.unwrap_or_default()))
                }
                Value::Array(sub) if multiple => Ok(Value::Array(self.create_array_entity(
                    model, column, items, sub, fields, false, full, depth,
                )?)),
                other => Err(SchemaError::type_mismatch(
                    &self.schema.label(model),
                    column.name(),
                    "object",
                    shape_name(other),
                )),
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn create_map_entity(
        &self,
        model: ModelId,
        column: &Column,
        values: &Items,
        entries: &Map<String, Value>,
        fields: &[String],
        full: bool,
        depth: usize,
    ) -> SchemaResult<Map<String, Value>> {
        let Some(nested) = values.model() else {
            return Ok(entries.clone());
        };
        let nested = self.schema.entity_model(nested)?;

        entries
            .iter()
            .map(|(key, value)| {
                let entry = value.as_object().ok_or_else(|| {
                    SchemaError::type_mismatch(
                        &self.schema.label(model),
                        column.name(),
                        "object",
                        shape_name(value),
                    )
                })?;
                let entity = self.create_entity(nested, entry, fields, true, full, depth + 1)?;
                Ok((key.clone(), Value::Object(entity.unwrap_or_default())))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaErrorCode, SchemaRegistry};
    use serde_json::json;

    const ALL: [&str; 0] = [];

    fn user_schema() -> (Schema, ModelId) {
        let mut registry = SchemaRegistry::new();
        let user = registry.define("User", "users").unwrap();
        let address = registry.declare("Address");
        registry.column(user, "id").unwrap().id().unwrap().primary().unwrap();
        registry.column(user, "name").unwrap().string(None, None).unwrap().required().unwrap();
        registry.column(user, "email").unwrap().string(None, None).unwrap().required().unwrap();
        registry.column(user, "password").unwrap().string(None, None).unwrap().write_only().unwrap();
        registry.column(user, "address").unwrap().object(address).unwrap();
        registry.column(user, "home").unwrap().object(address).unwrap().required().unwrap();
        registry.column(address, "city").unwrap().string(None, None).unwrap();
        registry.column(address, "zip").unwrap().string(None, None).unwrap();
        (registry.freeze().unwrap(), user)
    }

    #[test]
    fn test_write_only_never_returned() {
        let (schema, user) = user_schema();
        let err = Outputer::new(&schema)
            .create(user, &json!({"id": "u1", "password": "secret"}), &ALL)
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::WriteOnlyViolation);
    }

    #[test]
    fn test_full_collects_every_missing_column() {
        let (schema, user) = user_schema();
        let err = Outputer::new(&schema)
            .create_full(user, &json!({"id": "u1"}), &ALL)
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::MissingRequiredColumns);
        assert_eq!(err.columns(), ["email", "home", "name"]);
    }

    #[test]
    fn test_empty_optional_object_is_pruned() {
        let (schema, user) = user_schema();
        let entity = Outputer::new(&schema)
            .create(user, &json!({"id": "u1", "address": {"street": "x"}, "home": {}}), &ALL)
            .unwrap();
        assert!(!entity.contains_key("address"));
        assert_eq!(entity.get("home"), Some(&json!({})));
    }

    #[test]
    fn test_top_level_never_pruned() {
        let (schema, user) = user_schema();
        let entity = Outputer::new(&schema).create(user, &json!({}), &ALL).unwrap();
        assert!(entity.is_empty());
    }

    #[test]
    fn test_projection_narrows_nested_columns() {
        let (schema, user) = user_schema();
        let entry = json!({
            "id": "u1",
            "name": "Ann",
            "address": {"city": "Oslo", "zip": "0150"}
        });
        let entity = Outputer::new(&schema)
            .create(user, &entry, &["id", "address.city"])
            .unwrap();
        assert_eq!(
            Value::Object(entity),
            json!({"id": "u1", "address": {"city": "Oslo"}})
        );
    }

    #[test]
    fn test_write_only_outside_projection_is_ignored() {
        let (schema, user) = user_schema();
        let entity = Outputer::new(&schema)
            .create(user, &json!({"id": "u1", "password": "secret"}), &["id"])
            .unwrap();
        assert_eq!(Value::Object(entity), json!({"id": "u1"}));
    }
}
