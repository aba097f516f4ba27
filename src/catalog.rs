//! Entity catalog: owns the set of recognized entities and their values.
//!
//! The catalog is the authority for "upsert or reuse" during ingestion:
//! [`EntityCatalog::resolve_or_create_value`] is idempotent, so a batch may
//! call it repeatedly with the same (entity, value) pair and always get the
//! first-created record back.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::store::AnnotationStore;
use crate::types::{Entity, EntityId, EntityValue, ValueId};
use crate::{Error, Result};

/// Outcome of [`EntityCatalog::resolve_or_create_value`].
///
/// Reports what was created so callers (the import pipeline, mostly) can
/// log catalog growth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    /// The resolved or freshly created value record.
    pub value: EntityValue,
    /// True if the entity itself was created by this call.
    pub created_entity: bool,
    /// True if the value record was created by this call.
    pub created_value: bool,
}

#[derive(Debug, Default)]
struct Inner {
    entities: Vec<Entity>,
    values: Vec<EntityValue>,
    // name -> entity, (entity, value string) -> value record
    by_name: HashMap<String, EntityId>,
    by_pair: HashMap<(EntityId, String), ValueId>,
    next_entity: u64,
    next_value: u64,
}

/// Owns [`Entity`] and [`EntityValue`] lifecycles.
///
/// Insertion order is preserved for enumeration, so export payloads are
/// deterministic. Thread-safe; all methods take `&self`.
#[derive(Debug, Default)]
pub struct EntityCatalog {
    inner: RwLock<Inner>,
}

impl EntityCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Lock with poison recovery: a panicked writer leaves data intact
    // enough for reads, and tests rely on never deadlocking here.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Explicitly create an entity.
    ///
    /// Fails with [`Error::Validation`] if the name is empty or already taken.
    pub fn create_entity(&self, name: &str, lookups: &[&str]) -> Result<Entity> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("entity name must not be empty"));
        }
        let mut inner = self.write();
        if inner.by_name.contains_key(name) {
            return Err(Error::validation(format!(
                "entity {name:?} already exists"
            )));
        }
        let entity = alloc_entity(&mut inner, name, lookups);
        log::info!("created entity {:?} ({})", entity.name, entity.id);
        Ok(entity)
    }

    /// Return the stored value for (entity name, value), creating the value
    /// and, if needed, the entity on the way.
    ///
    /// Idempotent: a second call with identical arguments returns the
    /// first-created record and reports nothing created. A freshly created
    /// entity is tagged with `default_lookups`.
    pub fn resolve_or_create_value(
        &self,
        entity_name: &str,
        value: &str,
        default_lookups: &[&str],
    ) -> Result<ResolvedValue> {
        let entity_name = entity_name.trim();
        let value = value.trim();
        if entity_name.is_empty() {
            return Err(Error::validation("entity name must not be empty"));
        }
        if value.is_empty() {
            return Err(Error::validation("entity value must not be empty"));
        }

        let mut inner = self.write();

        let (entity_id, created_entity) = match inner.by_name.get(entity_name) {
            Some(id) => (*id, false),
            None => {
                let entity = alloc_entity(&mut inner, entity_name, default_lookups);
                log::info!("created entity {:?} ({})", entity.name, entity.id);
                (entity.id, true)
            }
        };

        if let Some(value_id) = inner.by_pair.get(&(entity_id, value.to_string())) {
            let record = inner
                .values
                .iter()
                .find(|v| v.id == *value_id)
                .cloned()
                .ok_or_else(|| Error::storage(format!("value index out of sync for {value_id}")))?;
            return Ok(ResolvedValue {
                value: record,
                created_entity,
                created_value: false,
            });
        }

        let id = ValueId(inner.next_value);
        inner.next_value += 1;
        let record = EntityValue {
            id,
            entity: entity_id,
            value: value.to_string(),
            synonyms: Vec::new(),
        };
        inner.by_pair.insert((entity_id, value.to_string()), id);
        inner.values.push(record.clone());
        log::debug!("created value {:?} for entity {entity_id}", record.value);

        Ok(ResolvedValue {
            value: record,
            created_entity,
            created_value: true,
        })
    }

    /// Add a synonym to an existing value.
    pub fn add_synonym(&self, id: ValueId, synonym: &str) -> Result<EntityValue> {
        let synonym = synonym.trim();
        if synonym.is_empty() {
            return Err(Error::validation("synonym must not be empty"));
        }
        let mut inner = self.write();
        let record = inner
            .values
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| Error::not_found(format!("entity value {id}")))?;
        if !record.synonyms.iter().any(|s| s == synonym) {
            record.synonyms.push(synonym.to_string());
        }
        Ok(record.clone())
    }

    /// Look up an entity by name (exact, case-sensitive).
    #[must_use]
    pub fn find_entity(&self, name: &str) -> Option<Entity> {
        let inner = self.read();
        let id = inner.by_name.get(name)?;
        inner.entities.iter().find(|e| e.id == *id).cloned()
    }

    /// Look up an entity by id.
    #[must_use]
    pub fn get_entity(&self, id: EntityId) -> Option<Entity> {
        self.read().entities.iter().find(|e| e.id == id).cloned()
    }

    /// Look up a value by (entity name, value string).
    #[must_use]
    pub fn find_value(&self, entity_name: &str, value: &str) -> Option<EntityValue> {
        let inner = self.read();
        let entity_id = inner.by_name.get(entity_name)?;
        let value_id = inner.by_pair.get(&(*entity_id, value.to_string()))?;
        inner.values.iter().find(|v| v.id == *value_id).cloned()
    }

    /// Look up a value by id.
    #[must_use]
    pub fn get_value(&self, id: ValueId) -> Option<EntityValue> {
        self.read().values.iter().find(|v| v.id == id).cloned()
    }

    /// True if an entity with this exact name exists.
    #[must_use]
    pub fn contains_entity(&self, name: &str) -> bool {
        self.read().by_name.contains_key(name)
    }

    /// All entities, in creation order.
    #[must_use]
    pub fn list_all(&self) -> Vec<Entity> {
        self.read().entities.clone()
    }

    /// All entities with their values, in creation order.
    ///
    /// Entities without values are included with an empty list, so export
    /// payloads carry the full label set.
    #[must_use]
    pub fn list_all_with_values(&self) -> Vec<(Entity, Vec<EntityValue>)> {
        let inner = self.read();
        inner
            .entities
            .iter()
            .map(|e| {
                let values = inner
                    .values
                    .iter()
                    .filter(|v| v.entity == e.id)
                    .cloned()
                    .collect();
                (e.clone(), values)
            })
            .collect()
    }

    /// Delete a value. Returns true if it existed.
    ///
    /// The entity itself is never auto-deleted. Annotation links referencing
    /// the value are owned by the store; use
    /// [`crate::snapshot::DataSet::delete_value`] to cascade them.
    pub fn delete_value(&self, id: ValueId) -> bool {
        let mut inner = self.write();
        let Some(pos) = inner.values.iter().position(|v| v.id == id) else {
            return false;
        };
        let removed = inner.values.remove(pos);
        inner.by_pair.remove(&(removed.entity, removed.value.clone()));
        log::info!("deleted value {:?} ({id})", removed.value);
        true
    }

    /// Values no annotation references.
    ///
    /// Cascade-deleting samples never garbage-collects values, so orphans
    /// accumulate by design; this is the reconciliation hook for a sweep.
    #[must_use]
    pub fn orphaned_values(&self, store: &AnnotationStore) -> Vec<EntityValue> {
        let referenced = store.referenced_value_ids();
        self.read()
            .values
            .iter()
            .filter(|v| !referenced.contains(&v.id))
            .cloned()
            .collect()
    }

    /// Number of entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.read().entities.len()
    }

    /// Number of values across all entities.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.read().values.len()
    }

    /// Snapshot for persistence.
    #[must_use]
    pub fn snapshot(&self) -> CatalogSnapshot {
        let inner = self.read();
        CatalogSnapshot {
            entities: inner.entities.clone(),
            values: inner.values.clone(),
        }
    }

    /// Rebuild a catalog from a snapshot, restoring indexes and id counters.
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self> {
        let mut inner = Inner::default();
        for entity in snapshot.entities {
            if inner.by_name.insert(entity.name.clone(), entity.id).is_some() {
                return Err(Error::validation(format!(
                    "snapshot contains duplicate entity name {:?}",
                    entity.name
                )));
            }
            inner.next_entity = inner.next_entity.max(entity.id.0 + 1);
            inner.entities.push(entity);
        }
        for value in snapshot.values {
            if !inner.entities.iter().any(|e| e.id == value.entity) {
                return Err(Error::validation(format!(
                    "snapshot value {:?} references missing entity {}",
                    value.value, value.entity
                )));
            }
            inner
                .by_pair
                .insert((value.entity, value.value.clone()), value.id);
            inner.next_value = inner.next_value.max(value.id.0 + 1);
            inner.values.push(value);
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }
}

fn alloc_entity(inner: &mut Inner, name: &str, lookups: &[&str]) -> Entity {
    let id = EntityId(inner.next_entity);
    inner.next_entity += 1;
    let entity = Entity {
        id,
        name: name.to_string(),
        lookups: lookups.iter().map(|l| (*l).to_string()).collect(),
    };
    inner.by_name.insert(name.to_string(), id);
    inner.entities.push(entity.clone());
    entity
}

/// Serializable catalog state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Entities in creation order.
    pub entities: Vec<Entity>,
    /// Values in creation order.
    pub values: Vec<EntityValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TRAIT_LOOKUP;

    #[test]
    fn resolve_creates_entity_and_value() {
        let catalog = EntityCatalog::new();
        let resolved = catalog
            .resolve_or_create_value("city", "Paris", &[TRAIT_LOOKUP])
            .unwrap();
        assert!(resolved.created_entity);
        assert!(resolved.created_value);
        assert_eq!(resolved.value.value, "Paris");
        assert!(catalog.find_entity("city").unwrap().is_trait());
    }

    #[test]
    fn resolve_is_idempotent() {
        let catalog = EntityCatalog::new();
        let first = catalog
            .resolve_or_create_value("city", "Paris", &[])
            .unwrap();
        let second = catalog
            .resolve_or_create_value("city", "Paris", &[])
            .unwrap();
        assert_eq!(first.value.id, second.value.id);
        assert!(!second.created_entity);
        assert!(!second.created_value);
        assert_eq!(catalog.value_count(), 1);
    }

    #[test]
    fn resolve_reuses_entity_for_new_value() {
        let catalog = EntityCatalog::new();
        catalog
            .resolve_or_create_value("city", "Paris", &[])
            .unwrap();
        let resolved = catalog
            .resolve_or_create_value("city", "Lyon", &[])
            .unwrap();
        assert!(!resolved.created_entity);
        assert!(resolved.created_value);
        assert_eq!(catalog.entity_count(), 1);
        assert_eq!(catalog.value_count(), 2);
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let catalog = EntityCatalog::new();
        assert!(catalog.resolve_or_create_value("", "Paris", &[]).is_err());
        assert!(catalog.resolve_or_create_value("city", "  ", &[]).is_err());
        assert!(catalog.create_entity("", &[]).is_err());
    }

    #[test]
    fn explicit_create_rejects_duplicate_name() {
        let catalog = EntityCatalog::new();
        catalog.create_entity("city", &[]).unwrap();
        assert!(catalog.create_entity("city", &[]).is_err());
    }

    #[test]
    fn list_all_with_values_includes_valueless_entities() {
        let catalog = EntityCatalog::new();
        catalog.create_entity("city", &[]).unwrap();
        catalog
            .resolve_or_create_value("cuisine", "thai", &[])
            .unwrap();
        let listed = catalog.list_all_with_values();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0.name, "city");
        assert!(listed[0].1.is_empty());
        assert_eq!(listed[1].1.len(), 1);
    }

    #[test]
    fn delete_value_keeps_entity() {
        let catalog = EntityCatalog::new();
        let resolved = catalog
            .resolve_or_create_value("city", "Paris", &[])
            .unwrap();
        assert!(catalog.delete_value(resolved.value.id));
        assert!(!catalog.delete_value(resolved.value.id));
        assert!(catalog.find_entity("city").is_some());
        assert!(catalog.find_value("city", "Paris").is_none());
    }

    #[test]
    fn deleted_value_slot_is_not_reused() {
        let catalog = EntityCatalog::new();
        let first = catalog
            .resolve_or_create_value("city", "Paris", &[])
            .unwrap();
        catalog.delete_value(first.value.id);
        let second = catalog
            .resolve_or_create_value("city", "Lyon", &[])
            .unwrap();
        assert_ne!(first.value.id, second.value.id);
    }

    #[test]
    fn snapshot_roundtrip() {
        let catalog = EntityCatalog::new();
        catalog
            .resolve_or_create_value("city", "Paris", &[TRAIT_LOOKUP])
            .unwrap();
        catalog.add_synonym(ValueId(0), "paname").unwrap();

        let restored = EntityCatalog::from_snapshot(catalog.snapshot()).unwrap();
        let value = restored.find_value("city", "Paris").unwrap();
        assert_eq!(value.synonyms, vec!["paname".to_string()]);

        // Counters continue past restored ids.
        let next = restored
            .resolve_or_create_value("city", "Lyon", &[])
            .unwrap();
        assert!(next.value.id.0 > value.id.0);
    }
}
