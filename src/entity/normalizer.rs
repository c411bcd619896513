//! Normalizer: converts materialized entities into plain transfer data

use serde_json::{Map, Value};

use super::Entity;
use crate::config::MapperConfig;
use crate::schema::{
    Column, Direction, FormatKind, Items, ModelId, Schema, SchemaError, SchemaResult, Structure,
};

const ALL_FIELDS: [&str; 0] = [];

/// Normalization switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Key properties by column alias instead of column name
    pub alias: bool,
    /// Include hidden columns
    pub reveal_hidden: bool,
    /// Flatten single nested entities into dot-joined keys
    pub unroll: bool,
}

impl NormalizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self) -> Self {
        self.alias = true;
        self
    }

    pub fn revealing_hidden(mut self) -> Self {
        self.reveal_hidden = true;
        self
    }

    pub fn unrolled(mut self) -> Self {
        self.unroll = true;
        self
    }
}

/// Normalize materializer
pub struct Normalizer<'a> {
    schema: &'a Schema,
    config: MapperConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self::with_config(schema, MapperConfig::default())
    }

    pub fn with_config(schema: &'a Schema, config: MapperConfig) -> Self {
        Self { schema, config }
    }

    /// Normalizes one entity
    pub fn create(
        &self,
        model: ModelId,
        entity: &Entity,
        options: NormalizeOptions,
    ) -> SchemaResult<Map<String, Value>> {
        self.create_entity(model, entity, options, 0)
    }

    pub fn create_array(
        &self,
        model: ModelId,
        entities: &[Entity],
        options: NormalizeOptions,
    ) -> SchemaResult<Vec<Map<String, Value>>> {
        entities
            .iter()
            .map(|entity| self.create_entity(model, entity, options, 0))
            .collect()
    }

    fn create_entity(
        &self,
        model: ModelId,
        entity: &Entity,
        options: NormalizeOptions,
        depth: usize,
    ) -> SchemaResult<Map<String, Value>> {
        if depth > self.config.max_depth {
            return Err(SchemaError::max_depth_exceeded(
                &self.schema.label(model),
                self.config.max_depth,
            ));
        }

        let mut plain = Map::new();
        for column in self.schema.rows(model, &ALL_FIELDS)? {
            let Some(value) = entity.get(column.name()) else {
                continue;
            };
            if column.is_hidden() && !options.reveal_hidden {
                continue;
            }

            let key = if options.alias {
                column.external_name()
            } else {
                column.name()
            };
            let value = self.create_value(column, value, options, depth)?;

            match value {
                Value::Object(nested)
                    if options.unroll && matches!(column.structure(), Structure::Object { .. }) =>
                {
                    for (sub, value) in nested {
                        plain.insert(format!("{key}.{sub}"), value);
                    }
                }
                value => {
                    plain.insert(key.to_string(), value);
                }
            }
        }
        Ok(plain)
    }

    fn create_value(
        &self,
        column: &Column,
        value: &Value,
        options: NormalizeOptions,
        depth: usize,
    ) -> SchemaResult<Value> {
        if value.is_null() && column.has_format(FormatKind::Null) {
            return Ok(column.cast(Value::Null, Direction::Normalize));
        }

        let converted = match (column.structure(), value) {
            (Structure::Array { items }, Value::Array(elements)) => Value::Array(
                self.create_array_entity(items, elements, column.multiple(), options, depth)?,
            ),
            (Structure::Map { values }, Value::Object(entries)) => {
                Value::Object(self.create_map_entity(values, entries, options, depth)?)
            }
            (Structure::Object { model }, Value::Object(entity)) => {
                let nested = self.schema.entity_model(model)?;
                Value::Object(self.create_entity(nested, entity, options, depth + 1)?)
            }
            _ => value.clone(),
        };

        Ok(column.cast(converted, Direction::Normalize))
    }

    fn create_array_entity(
        &self,
        items: &Items,
        elements: &[Value],
        multiple: bool,
        options: NormalizeOptions,
        depth: usize,
    ) -> SchemaResult<Vec<Value>> {
        let Some(nested) = items.model() else {
            return Ok(elements.to_vec());
        };
        let nested = self.schema.entity_model(nested)?;

        elements
            .iter()
            .map(|element| match element {
                Value::Object(entity) => Ok(Value::Object(
                    self.create_entity(nested, entity, options, depth + 1)?,
                )),
                Value::Array(sub) if multiple => Ok(Value::Array(
                    self.create_array_entity(items, sub, false, options, depth)?,
                )),
                other => Ok(other.clone()),
            })
            .collect()
    }

    fn create_map_entity(
        &self,
        values: &Items,
        entries: &Map<String, Value>,
        options: NormalizeOptions,
        depth: usize,
    ) -> SchemaResult<Map<String, Value>> {
        let Some(nested) = values.model() else {
            return Ok(entries.clone());
        };
        let nested = self.schema.entity_model(nested)?;

        entries
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::Object(entity) => {
                        Value::Object(self.create_entity(nested, entity, options, depth + 1)?)
                    }
                    other => other.clone(),
                };
                Ok((key.clone(), value))
            })
            .collect()
    }
}
