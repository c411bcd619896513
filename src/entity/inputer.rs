//! Inputer: builds entities headed for storage from caller data
//!
//! Only real columns are settable. A read-only column supplied by the caller
//! aborts the conversion; nothing partial is returned.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{shape_name, Entity, ROOT};
use crate::config::MapperConfig;
use crate::schema::{
    Column, Direction, FormatKind, Items, ModelId, Schema, SchemaError, SchemaResult, Structure,
};

const ALL_FIELDS: [&str; 0] = [];

/// Input materializer
pub struct Inputer<'a> {
    schema: &'a Schema,
    config: MapperConfig,
}

impl<'a> Inputer<'a> {
    /// Creates an inputer with the default configuration
    pub fn new(schema: &'a Schema) -> Self {
        Self::with_config(schema, MapperConfig::default())
    }

    pub fn with_config(schema: &'a Schema, config: MapperConfig) -> Self {
        Self { schema, config }
    }

    /// Builds an entity, tolerating missing required columns
    pub fn create(&self, model: ModelId, entry: &Value) -> SchemaResult<Entity> {
        self.create_root(model, entry, false)
    }

    /// Builds an entity, failing on the first missing required column
    pub fn create_full(&self, model: ModelId, entry: &Value) -> SchemaResult<Entity> {
        self.create_root(model, entry, true)
    }

    pub fn create_array(&self, model: ModelId, entries: &[Value]) -> SchemaResult<Vec<Entity>> {
        entries
            .iter()
            .map(|entry| self.create_root(model, entry, false))
            .collect()
    }

    pub fn create_full_array(
        &self,
        model: ModelId,
        entries: &[Value],
    ) -> SchemaResult<Vec<Entity>> {
        entries
            .iter()
            .map(|entry| self.create_root(model, entry, true))
            .collect()
    }

    pub fn create_map(
        &self,
        model: ModelId,
        entries: &Map<String, Value>,
    ) -> SchemaResult<BTreeMap<String, Entity>> {
        entries
            .iter()
            .map(|(key, entry)| Ok((key.clone(), self.create_root(model, entry, false)?)))
            .collect()
    }

    pub fn create_full_map(
        &self,
        model: ModelId,
        entries: &Map<String, Value>,
    ) -> SchemaResult<BTreeMap<String, Entity>> {
        entries
            .iter()
            .map(|(key, entry)| Ok((key.clone(), self.create_root(model, entry, true)?)))
            .collect()
    }

    fn create_root(&self, model: ModelId, entry: &Value, full: bool) -> SchemaResult<Entity> {
        let entry = entry.as_object().ok_or_else(|| {
            SchemaError::type_mismatch(&self.schema.label(model), ROOT, "object", shape_name(entry))
        })?;
        self.create_entity(model, entry, full, 0)
    }

    fn create_entity(
        &self,
        model: ModelId,
        entry: &Map<String, Value>,
        full: bool,
        depth: usize,
    ) -> SchemaResult<Entity> {
        if depth > self.config.max_depth {
            return Err(SchemaError::max_depth_exceeded(
                &self.schema.label(model),
                self.config.max_depth,
            ));
        }

        let mut entity = Entity::new();
        for column in self.schema.real_row(model, &ALL_FIELDS)? {
            match entry.get(column.name()) {
                None => {
                    if full && column.is_required() && !column.is_read_only() {
                        return Err(SchemaError::missing_required_column(
                            &self.schema.label(model),
                            column.name(),
                        ));
                    }
                }
                Some(_) if column.is_read_only() => {
                    return Err(SchemaError::read_only_violation(
                        &self.schema.label(model),
                        column.name(),
                    ));
                }
                Some(value) => {
                    let value = self.create_value(model, column, value, full, depth)?;
                    self.check_format(model, column, &value)?;
                    entity.insert(column.name().to_string(), value);
                }
            }
        }
        Ok(entity)
    }

    fn check_format(&self, model: ModelId, column: &Column, value: &Value) -> SchemaResult<()> {
        if !self.config.validate_formats
            || !column.validation().is_declared()
            || column.validate(Some(value))
        {
            return Ok(());
        }
        Err(SchemaError::invalid_value(
            &self.schema.label(model),
            column.name(),
            &column.validation().describe(),
        ))
    }

    fn create_value(
        &self,
        model: ModelId,
        column: &Column,
        value: &Value,
        full: bool,
        depth: usize,
    ) -> SchemaResult<Value> {
        if value.is_null() && column.has_format(FormatKind::Null) {
            return Ok(column.cast(Value::Null, Direction::Input));
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
                    column.multiple(),
                    full,
                    depth,
                )?)
            }
            Structure::Map { values } => {
                let entries = value.as_object().ok_or_else(|| mismatch("map"))?;
                Value::Object(self.create_map_entity(model, column, values, entries, full, depth)?)
            }
            Structure::Object { model: nested } => {
                let nested = self.schema.entity_model(nested)?;
                let entry = value.as_object().ok_or_else(|| mismatch("object"))?;
                Value::Object(self.create_entity(nested, entry, full, depth + 1)?)
            }
        };

        Ok(column.cast(converted, Direction::Input))
    }

    /// Converts array elements; `multiple` admits one level of sub-arrays
    #[allow(clippy::too_many_arguments)]
    fn create_array_entity(
        &self,
        model: ModelId,
        column: &Column,
        items: &Items,
        elements: &[Value],
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
                Value::Object(entry) => Ok(Value::Object(
                    self.create_entity(nested, entry, full, depth + 1)?,
                )),
                Value::Array(sub) if multiple => Ok(Value::Array(self.create_array_entity(
                    model, column, items, sub, false, full, depth,
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

    fn create_map_entity(
        &self,
        model: ModelId,
        column: &Column,
        values: &Items,
        entries: &Map<String, Value>,
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
                Ok((
                    key.clone(),
                    Value::Object(self.create_entity(nested, entry, full, depth + 1)?),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaErrorCode, SchemaRegistry};
    use serde_json::json;

    fn user_schema() -> (Schema, ModelId) {
        let mut registry = SchemaRegistry::new();
        let user = registry.define("User", "users").unwrap();
        let address = registry.declare("Address");
        registry.column(user, "id").unwrap().id().unwrap().primary().unwrap().read_only().unwrap();
        registry.column(user, "name").unwrap().string(None, None).unwrap().required().unwrap();
        registry.column(user, "nick").unwrap().string(None, None).unwrap().null().unwrap();
        registry.column(user, "address").unwrap().object(address).unwrap();
        registry.column(address, "city").unwrap().string(None, None).unwrap().required().unwrap();
        (registry.freeze().unwrap(), user)
    }

    #[test]
    fn test_partial_tolerates_missing_required() {
        let (schema, user) = user_schema();
        let entity = Inputer::new(&schema).create(user, &json!({})).unwrap();
        assert!(entity.is_empty());
    }

    #[test]
    fn test_full_requires_columns() {
        let (schema, user) = user_schema();
        let err = Inputer::new(&schema).create_full(user, &json!({})).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::MissingRequiredColumn);
        assert_eq!(err.columns(), ["name".to_string()]);
    }

    #[test]
    fn test_read_only_rejected() {
        let (schema, user) = user_schema();
        let err = Inputer::new(&schema)
            .create(user, &json!({"id": "u1", "name": "Ann"}))
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::ReadOnlyViolation);
    }

    #[test]
    fn test_nested_required_enforced_in_full_mode() {
        let (schema, user) = user_schema();
        let inputer = Inputer::new(&schema);
        let entry = json!({"name": "Ann", "address": {}});

        assert!(inputer.create(user, &entry).is_ok());
        let err = inputer.create_full(user, &entry).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::MissingRequiredColumn);
        assert_eq!(err.columns(), ["city".to_string()]);
    }

    #[test]
    fn test_unknown_keys_dropped() {
        let (schema, user) = user_schema();
        let entity = Inputer::new(&schema)
            .create(user, &json!({"name": "Ann", "extra": true}))
            .unwrap();
        assert_eq!(Value::Object(entity), json!({"name": "Ann"}));
    }

    #[test]
    fn test_null_passes_with_null_format() {
        let (schema, user) = user_schema();
        let inputer = Inputer::new(&schema);
        let entity = inputer.create(user, &json!({"nick": null})).unwrap();
        assert_eq!(entity.get("nick"), Some(&Value::Null));

        let err = inputer.create(user, &json!({"name": null})).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::InvalidValue);
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let (schema, user) = user_schema();
        let inputer = Inputer::with_config(&schema, MapperConfig::without_validation());
        let entity = inputer.create(user, &json!({"name": 42})).unwrap();
        assert_eq!(entity.get("name"), Some(&json!(42)));
    }

    #[test]
    fn test_object_type_mismatch() {
        let (schema, user) = user_schema();
        let err = Inputer::new(&schema)
            .create(user, &json!({"address": "Main St"}))
            .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::TypeMismatch);
    }

    #[test]
    fn test_root_must_be_object() {
        let (schema, user) = user_schema();
        let err = Inputer::new(&schema).create(user, &json!([1])).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::TypeMismatch);
        assert_eq!(err.columns(), [ROOT.to_string()]);
    }
}
