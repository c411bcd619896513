//! # Storage Driver
//!
//! Persistence backend the mapper calls into. Drivers receive plain entity
//! data and opaque filters; they never see the schema.

use serde_json::Value;

use super::errors::DriverResult;
use crate::entity::Entity;
use crate::query::Filter;
use crate::schema::JoinDescriptor;

/// Storage addressed by an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Storage name
    pub storage: String,
    /// Primary column, if the entity declares one
    pub primary: Option<String>,
}

impl Target {
    pub fn new(storage: impl Into<String>, primary: Option<String>) -> Self {
        Self {
            storage: storage.into(),
            primary,
        }
    }
}

/// Read shape of a find
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    /// Real columns to return
    pub columns: Vec<String>,
    /// Virtual columns to resolve
    pub joins: Vec<JoinDescriptor>,
}

/// Trait for storage drivers
pub trait Driver: Send + Sync {
    /// Stores entities and returns their primary keys, `Null` when the
    /// target has no primary column
    fn insert(&self, target: &Target, entities: Vec<Entity>) -> DriverResult<Vec<Value>>;

    /// Loads the entities matching `filter`
    fn find(&self, target: &Target, filter: &Filter, select: &Select) -> DriverResult<Vec<Entity>>;

    /// Loads one entity by primary key
    fn find_by_id(
        &self,
        target: &Target,
        id: &Value,
        select: &Select,
    ) -> DriverResult<Option<Entity>>;

    /// Merges `changes` into every matching entity; returns the match count
    fn update(&self, target: &Target, filter: &Filter, changes: &Entity) -> DriverResult<usize>;

    /// Merges `changes` into one entity; returns false if it does not exist
    fn update_by_id(&self, target: &Target, id: &Value, changes: &Entity) -> DriverResult<bool>;

    /// Removes every matching entity; returns the removed count
    fn delete(&self, target: &Target, filter: &Filter) -> DriverResult<usize>;

    /// Removes one entity; returns false if it does not exist
    fn delete_by_id(&self, target: &Target, id: &Value) -> DriverResult<bool>;
}
