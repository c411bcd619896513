//! # Mapper
//!
//! CRUD orchestration over a driver. Writes go through the Inputer, reads
//! come back through the Outputer, and the Normalizer shapes results for
//! transfer.

use serde_json::{Map, Value};

use super::driver::{Driver, Select, Target};
use super::errors::MapperResult;
use crate::config::MapperConfig;
use crate::entity::{Entity, Inputer, NormalizeOptions, Normalizer, Outputer};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, MetricsSnapshot};
use crate::query::Filter;
use crate::schema::{ModelId, Schema, SchemaResult};

/// Schema-aware CRUD over a storage driver
pub struct Mapper<'s, D: Driver> {
    schema: &'s Schema,
    driver: D,
    config: MapperConfig,
    metrics: MetricsRegistry,
}

impl<'s, D: Driver> Mapper<'s, D> {
    pub fn new(schema: &'s Schema, driver: D) -> Self {
        Self::with_config(schema, driver, MapperConfig::default())
    }

    pub fn with_config(schema: &'s Schema, driver: D, config: MapperConfig) -> Self {
        Self {
            schema,
            driver,
            config,
            metrics: MetricsRegistry::new(),
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Current operation counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Validates and stores one entry; returns its primary key
    pub fn insert(&self, model: ModelId, entry: &Value) -> MapperResult<Value> {
        let ids = self.insert_many(model, std::slice::from_ref(entry))?;
        Ok(ids.into_iter().next().unwrap_or(Value::Null))
    }

    /// Validates every entry before storing any of them
    pub fn insert_many(&self, model: ModelId, entries: &[Value]) -> MapperResult<Vec<Value>> {
        let (target, entities) = self.checked(model, || {
            let target = self.target(model)?;
            let inputer = Inputer::with_config(self.schema, self.config.clone());
            Ok((target, inputer.create_full_array(model, entries)?))
        })?;

        let ids = self.driver.insert(&target, entities)?;
        self.metrics.add_inserted(ids.len() as u64);
        let count = ids.len().to_string();
        log_event_with_fields(
            Event::EntityInserted,
            &[("count", count.as_str()), ("storage", target.storage.as_str())],
        );
        Ok(ids)
    }

    /// Loads matching entities restricted to `fields` (empty: all columns)
    pub fn find<S: AsRef<str>>(
        &self,
        model: ModelId,
        filter: &Filter,
        fields: &[S],
    ) -> MapperResult<Vec<Entity>> {
        let (target, select) = self.checked(model, || {
            Ok((self.target(model)?, self.select(model, fields)?))
        })?;

        let rows: Vec<Value> = self
            .driver
            .find(&target, filter, &select)?
            .into_iter()
            .map(Value::Object)
            .collect();
        let entities = self.checked(model, || {
            Outputer::with_config(self.schema, self.config.clone())
                .create_full_array(model, &rows, fields)
        })?;

        self.metrics.add_found(entities.len() as u64);
        let count = entities.len().to_string();
        log_event_with_fields(
            Event::EntityFound,
            &[("count", count.as_str()), ("storage", target.storage.as_str())],
        );
        Ok(entities)
    }

    /// Loads one entity by primary key
    pub fn find_by_id<S: AsRef<str>>(
        &self,
        model: ModelId,
        id: &Value,
        fields: &[S],
    ) -> MapperResult<Option<Entity>> {
        let (target, select) = self.checked(model, || {
            Ok((self.keyed_target(model)?, self.select(model, fields)?))
        })?;

        let Some(row) = self.driver.find_by_id(&target, id, &select)? else {
            return Ok(None);
        };
        let entity = self.checked(model, || {
            Outputer::with_config(self.schema, self.config.clone()).create_full(
                model,
                &Value::Object(row),
                fields,
            )
        })?;

        self.metrics.add_found(1);
        log_event_with_fields(Event::EntityFound, &[("storage", target.storage.as_str())]);
        Ok(Some(entity))
    }

    /// Applies a partial entry to every matching entity
    pub fn update(&self, model: ModelId, filter: &Filter, changes: &Value) -> MapperResult<usize> {
        let (target, changes) = self.checked(model, || {
            let inputer = Inputer::with_config(self.schema, self.config.clone());
            Ok((self.target(model)?, inputer.create(model, changes)?))
        })?;

        let updated = self.driver.update(&target, filter, &changes)?;
        self.record_updated(&target, updated);
        Ok(updated)
    }

    /// Applies a partial entry to one entity
    pub fn update_by_id(&self, model: ModelId, id: &Value, changes: &Value) -> MapperResult<bool> {
        let (target, changes) = self.checked(model, || {
            let inputer = Inputer::with_config(self.schema, self.config.clone());
            Ok((self.keyed_target(model)?, inputer.create(model, changes)?))
        })?;

        let updated = self.driver.update_by_id(&target, id, &changes)?;
        self.record_updated(&target, usize::from(updated));
        Ok(updated)
    }

    pub fn delete(&self, model: ModelId, filter: &Filter) -> MapperResult<usize> {
        let target = self.checked(model, || self.target(model))?;
        let deleted = self.driver.delete(&target, filter)?;
        self.record_deleted(&target, deleted);
        Ok(deleted)
    }

    pub fn delete_by_id(&self, model: ModelId, id: &Value) -> MapperResult<bool> {
        let target = self.checked(model, || self.keyed_target(model))?;
        let deleted = self.driver.delete_by_id(&target, id)?;
        self.record_deleted(&target, usize::from(deleted));
        Ok(deleted)
    }

    /// Shapes an entity for transfer
    pub fn normalize(
        &self,
        model: ModelId,
        entity: &Entity,
        options: NormalizeOptions,
    ) -> MapperResult<Map<String, Value>> {
        let plain = self.checked(model, || {
            Normalizer::with_config(self.schema, self.config.clone()).create(model, entity, options)
        })?;
        self.metrics.add_normalized(1);
        Ok(plain)
    }

    pub fn normalize_many(
        &self,
        model: ModelId,
        entities: &[Entity],
        options: NormalizeOptions,
    ) -> MapperResult<Vec<Map<String, Value>>> {
        let plain = self.checked(model, || {
            Normalizer::with_config(self.schema, self.config.clone())
                .create_array(model, entities, options)
        })?;
        self.metrics.add_normalized(plain.len() as u64);
        Ok(plain)
    }

    fn target(&self, model: ModelId) -> SchemaResult<Target> {
        let primary = self
            .schema
            .primary_column(model)
            .ok()
            .map(|column| column.name().to_string());
        Ok(Target::new(self.schema.storage_name(model)?, primary))
    }

    /// Target of a by-id operation; the entity must declare a primary column
    fn keyed_target(&self, model: ModelId) -> SchemaResult<Target> {
        let primary = self.schema.primary_column(model)?.name().to_string();
        Ok(Target::new(self.schema.storage_name(model)?, Some(primary)))
    }

    fn select<S: AsRef<str>>(&self, model: ModelId, fields: &[S]) -> SchemaResult<Select> {
        Ok(Select {
            columns: self.schema.readable_columns(model, fields)?,
            joins: self.schema.joins(model, fields)?,
        })
    }

    /// Runs a schema step, counting and logging rejections
    fn checked<T, F>(&self, model: ModelId, step: F) -> MapperResult<T>
    where
        F: FnOnce() -> SchemaResult<T>,
    {
        step().map_err(|err| {
            self.metrics.increment_rejected();
            if self.config.log_rejections {
                let entity = self.schema.label(model);
                let columns = err.columns().join(",");
                log_event_with_fields(
                    Event::EntityRejected,
                    &[
                        ("code", err.code().code()),
                        ("columns", columns.as_str()),
                        ("entity", entity.as_str()),
                    ],
                );
            }
            err.into()
        })
    }

    fn record_updated(&self, target: &Target, count: usize) {
        self.metrics.add_updated(count as u64);
        let count = count.to_string();
        log_event_with_fields(
            Event::EntityUpdated,
            &[("count", count.as_str()), ("storage", target.storage.as_str())],
        );
    }

    fn record_deleted(&self, target: &Target, count: usize) {
        self.metrics.add_deleted(count as u64);
        let count = count.to_string();
        log_event_with_fields(
            Event::EntityDeleted,
            &[("count", count.as_str()), ("storage", target.storage.as_str())],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::MemoryDriver;
    use crate::schema::{SchemaErrorCode, SchemaRegistry};
    use serde_json::json;

    const ALL: [&str; 0] = [];

    fn schema() -> (Schema, ModelId, ModelId) {
        let mut registry = SchemaRegistry::new();
        let user = registry.define("User", "users").unwrap();
        let log = registry.define("Log", "logs").unwrap();
        registry.column(user, "id").unwrap().id().unwrap().primary().unwrap();
        registry.column(user, "name").unwrap().string(Some(1), None).unwrap().required().unwrap();
        registry.column(user, "password").unwrap().string(None, None).unwrap().write_only().unwrap();
        registry.column(log, "line").unwrap().string(None, None).unwrap();
        (registry.freeze().unwrap(), user, log)
    }

    #[test]
    fn test_insert_then_find_by_id() {
        let (schema, user, _) = schema();
        let mapper = Mapper::new(&schema, MemoryDriver::new());

        let id = mapper
            .insert(user, &json!({"id": "u1", "name": "Ann", "password": "pw"}))
            .unwrap();
        assert_eq!(id, json!("u1"));

        let found = mapper.find_by_id(user, &id, &ALL).unwrap().unwrap();
        assert_eq!(Value::Object(found), json!({"id": "u1", "name": "Ann"}));
        assert_eq!(mapper.driver().dump("users").unwrap()[0]["password"], json!("pw"));
    }

    #[test]
    fn test_rejections_are_counted() {
        let (schema, user, _) = schema();
        let mapper = Mapper::new(&schema, MemoryDriver::new());

        let err = mapper.insert(user, &json!({"id": "u1"})).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::MissingRequiredColumn.code());
        let err = mapper.insert(user, &json!({"name": ""})).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::InvalidValue.code());

        let metrics = mapper.metrics();
        assert_eq!(metrics.rejected, 2);
        assert_eq!(metrics.inserted, 0);
        assert_eq!(mapper.driver().count("users").unwrap(), 0);
    }

    #[test]
    fn test_by_id_requires_primary_column() {
        let (schema, _, log) = schema();
        let mapper = Mapper::new(&schema, MemoryDriver::new());
        assert_eq!(mapper.insert(log, &json!({"line": "boot"})).unwrap(), Value::Null);

        let err = mapper.delete_by_id(log, &json!(1)).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::NoPrimaryColumn.code());
    }

    #[test]
    fn test_update_and_delete_counts() {
        let (schema, user, _) = schema();
        let mapper = Mapper::new(&schema, MemoryDriver::new());
        mapper
            .insert_many(user, &[json!({"name": "Ann"}), json!({"name": "Bob"})])
            .unwrap();

        let renamed = mapper
            .update(user, &Filter::all().filter_eq("name", json!("Bob")), &json!({"name": "Rob"}))
            .unwrap();
        assert_eq!(renamed, 1);
        assert_eq!(mapper.delete(user, &Filter::all()).unwrap(), 2);

        let metrics = mapper.metrics();
        assert_eq!(metrics.inserted, 2);
        assert_eq!(metrics.updated, 1);
        assert_eq!(metrics.deleted, 2);
    }
}
