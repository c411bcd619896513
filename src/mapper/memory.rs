//! # In-Memory Driver
//!
//! Keeps every storage as a vector of entities behind one `RwLock`. Joins are
//! resolved one level deep: joined entities carry their real columns only.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use uuid::Uuid;

use super::driver::{Driver, Select, Target};
use super::errors::{DriverError, DriverResult};
use crate::entity::Entity;
use crate::query::{Filter, PredicateFilter};
use crate::schema::JoinDescriptor;

type Storages = HashMap<String, Vec<Entity>>;

/// In-memory driver for tests and prototyping
#[derive(Debug, Default)]
pub struct MemoryDriver {
    storages: RwLock<Storages>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self {
            storages: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entities
    pub fn count(&self, storage: &str) -> DriverResult<usize> {
        Ok(self.read()?.get(storage).map_or(0, Vec::len))
    }

    /// Stored entities exactly as persisted
    pub fn dump(&self, storage: &str) -> DriverResult<Vec<Entity>> {
        Ok(self.read()?.get(storage).cloned().unwrap_or_default())
    }

    fn read(&self) -> DriverResult<RwLockReadGuard<'_, Storages>> {
        self.storages
            .read()
            .map_err(|_| DriverError::Internal("Lock poisoned".to_string()))
    }

    fn write(&self) -> DriverResult<RwLockWriteGuard<'_, Storages>> {
        self.storages
            .write()
            .map_err(|_| DriverError::Internal("Lock poisoned".to_string()))
    }

    fn primary(target: &Target) -> DriverResult<&str> {
        target
            .primary
            .as_deref()
            .ok_or_else(|| DriverError::NoPrimaryKey(target.storage.clone()))
    }

    fn duplicate(target: &Target, key: &Value) -> DriverError {
        DriverError::DuplicateKey {
            storage: target.storage.clone(),
            key: key.to_string(),
        }
    }

    fn select_columns(row: &Entity, columns: &[String]) -> Entity {
        columns
            .iter()
            .filter_map(|column| row.get(column).map(|value| (column.clone(), value.clone())))
            .collect()
    }

    fn project(storages: &Storages, row: &Entity, select: &Select) -> DriverResult<Entity> {
        let mut entity = Self::select_columns(row, &select.columns);
        for join in &select.joins {
            if let Some(joined) = Self::resolve_join(storages, row, join)? {
                entity.insert(join.virtual_name.clone(), joined);
            }
        }
        Ok(entity)
    }

    fn resolve_join(
        storages: &Storages,
        row: &Entity,
        join: &JoinDescriptor,
    ) -> DriverResult<Option<Value>> {
        let Some(local) = row.get(&join.local).filter(|value| !value.is_null()) else {
            return Ok(None);
        };

        let candidates: Vec<&Entity> = storages
            .get(&join.storage)
            .map(|rows| {
                rows.iter()
                    .filter(|candidate| {
                        join.query
                            .as_ref()
                            .map_or(true, |query| PredicateFilter::matches(candidate, &query.predicates))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let limit = join
            .query
            .as_ref()
            .and_then(|query| query.limit)
            .unwrap_or(usize::MAX);

        let load = |candidate: &Entity| Value::Object(Self::select_columns(candidate, &join.columns));
        let keyed = |candidate: &Entity, key: &Value| candidate.get(&join.foreign) == Some(key);

        let joined = if join.multiple {
            let keys = local.as_array().ok_or_else(|| DriverError::InvalidJoin {
                storage: join.storage.clone(),
                reason: format!("local column '{}' is not an array", join.local),
            })?;
            if join.all {
                candidates
                    .iter()
                    .copied()
                    .filter(|candidate| keys.iter().any(|key| keyed(*candidate, key)))
                    .take(limit)
                    .map(|candidate| load(candidate))
                    .collect()
            } else {
                keys.iter()
                    .filter_map(|key| candidates.iter().copied().find(|candidate| keyed(*candidate, key)))
                    .map(|candidate| load(candidate))
                    .collect()
            }
        } else if join.all {
            candidates
                .iter()
                .copied()
                .filter(|candidate| keyed(*candidate, local))
                .take(limit)
                .map(|candidate| load(candidate))
                .collect()
        } else {
            match candidates.iter().copied().find(|candidate| keyed(*candidate, local)) {
                Some(candidate) => load(candidate),
                None => return Ok(None),
            }
        };
        Ok(Some(joined))
    }
}

impl Driver for MemoryDriver {
    fn insert(&self, target: &Target, entities: Vec<Entity>) -> DriverResult<Vec<Value>> {
        let mut storages = self.write()?;
        let rows = storages.entry(target.storage.clone()).or_default();

        let mut staged: Vec<Entity> = Vec::with_capacity(entities.len());
        let mut ids = Vec::with_capacity(entities.len());
        for mut entity in entities {
            let id = match target.primary.as_deref() {
                Some(primary) => {
                    let existing = entity.get(primary).filter(|id| !id.is_null()).cloned();
                    let id = match existing {
                        Some(id) => id,
                        None => {
                            let id = Value::String(Uuid::new_v4().to_string());
                            entity.insert(primary.to_string(), id.clone());
                            id
                        }
                    };
                    if rows
                        .iter()
                        .chain(staged.iter())
                        .any(|row| row.get(primary) == Some(&id))
                    {
                        return Err(Self::duplicate(target, &id));
                    }
                    id
                }
                None => Value::Null,
            };
            staged.push(entity);
            ids.push(id);
        }

        rows.extend(staged);
        Ok(ids)
    }

    fn find(&self, target: &Target, filter: &Filter, select: &Select) -> DriverResult<Vec<Entity>> {
        let storages = self.read()?;
        let Some(rows) = storages.get(&target.storage) else {
            return Ok(Vec::new());
        };

        rows.iter()
            .filter(|row| PredicateFilter::matches(row, &filter.predicates))
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|row| Self::project(&storages, row, select))
            .collect()
    }

    fn find_by_id(
        &self,
        target: &Target,
        id: &Value,
        select: &Select,
    ) -> DriverResult<Option<Entity>> {
        let primary = Self::primary(target)?;
        let storages = self.read()?;
        storages
            .get(&target.storage)
            .and_then(|rows| rows.iter().find(|row| row.get(primary) == Some(id)))
            .map(|row| Self::project(&storages, row, select))
            .transpose()
    }

    fn update(&self, target: &Target, filter: &Filter, changes: &Entity) -> DriverResult<usize> {
        let mut storages = self.write()?;
        let Some(rows) = storages.get_mut(&target.storage) else {
            return Ok(0);
        };

        let matched: Vec<bool> = rows
            .iter()
            .map(|row| PredicateFilter::matches(row, &filter.predicates))
            .collect();

        // A new primary key may land on at most one row and must stay unique
        let new_id = target
            .primary
            .as_deref()
            .and_then(|primary| changes.get(primary).map(|id| (primary, id)));
        if let Some((primary, new_id)) = new_id {
            let clashes = rows
                .iter()
                .zip(&matched)
                .any(|(row, hit)| !*hit && row.get(primary) == Some(new_id));
            if clashes || matched.iter().filter(|hit| **hit).count() > 1 {
                return Err(Self::duplicate(target, new_id));
            }
        }

        let mut updated = 0;
        for (row, _) in rows.iter_mut().zip(&matched).filter(|(_, hit)| **hit) {
            row.extend(changes.clone());
            updated += 1;
        }
        Ok(updated)
    }

    fn update_by_id(&self, target: &Target, id: &Value, changes: &Entity) -> DriverResult<bool> {
        let primary = Self::primary(target)?;
        let mut storages = self.write()?;
        let Some(rows) = storages.get_mut(&target.storage) else {
            return Ok(false);
        };

        if let Some(new_id) = changes.get(primary).filter(|new_id| *new_id != id) {
            if rows.iter().any(|row| row.get(primary) == Some(new_id)) {
                return Err(Self::duplicate(target, new_id));
            }
        }

        match rows.iter_mut().find(|row| row.get(primary) == Some(id)) {
            Some(row) => {
                row.extend(changes.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, target: &Target, filter: &Filter) -> DriverResult<usize> {
        let mut storages = self.write()?;
        let Some(rows) = storages.get_mut(&target.storage) else {
            return Ok(0);
        };

        let before = rows.len();
        rows.retain(|row| !PredicateFilter::matches(row, &filter.predicates));
        Ok(before - rows.len())
    }

    fn delete_by_id(&self, target: &Target, id: &Value) -> DriverResult<bool> {
        let primary = Self::primary(target)?;
        let mut storages = self.write()?;
        let Some(rows) = storages.get_mut(&target.storage) else {
            return Ok(false);
        };

        match rows.iter().position(|row| row.get(primary) == Some(id)) {
            Some(index) => {
                rows.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
