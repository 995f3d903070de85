//! Server-authoritative entity cache and the offline read view
//!
//! [`EntityCache`] mirrors what the server last returned for an entity
//! type under `cached_<entity>`. [`OfflineReader`] merges that mirror with
//! the shadow records of not-yet-synced creates, which is what list screens
//! show while offline.

use std::sync::Arc;

use serde_json::{Map, Value};

use timegrid_core::domain::{entity_id, EntityType, Record};
use timegrid_core::ports::IStorageEngine;

use crate::{ShadowStore, SyncError};

/// Mirror of server entities, keyed by remote id
#[derive(Clone)]
pub struct EntityCache {
    storage: Arc<dyn IStorageEngine>,
}

impl EntityCache {
    pub fn new(storage: Arc<dyn IStorageEngine>) -> Self {
        Self { storage }
    }

    /// Stores one server entity; returns `false` if it has no `id`
    pub async fn put(&self, entity_type: &EntityType, entity: &Value) -> Result<bool, SyncError> {
        let Some(id) = entity_id(entity) else {
            return Ok(false);
        };
        self.storage
            .put(&entity_type.cached_namespace(), &Record::new(id, entity.clone()))
            .await?;
        Ok(true)
    }

    /// Applies a partial update to a cached entity, if present
    pub async fn merge(&self, entity_type: &EntityType, id: &str, partial: &Value) -> Result<bool, SyncError> {
        let namespace = entity_type.cached_namespace();
        let Some(Value::Object(mut current)) = self.storage.get(&namespace, id).await? else {
            return Ok(false);
        };
        if let Value::Object(fields) = partial {
            for (key, value) in fields {
                current.insert(key.clone(), value.clone());
            }
        }
        self.storage
            .put(&namespace, &Record::new(id, Value::Object(current)))
            .await?;
        Ok(true)
    }

    pub async fn get(&self, entity_type: &EntityType, id: &str) -> Result<Option<Value>, SyncError> {
        Ok(self.storage.get(&entity_type.cached_namespace(), id).await?)
    }

    pub async fn remove(&self, entity_type: &EntityType, id: &str) -> Result<(), SyncError> {
        self.storage
            .delete(&entity_type.cached_namespace(), id)
            .await?;
        Ok(())
    }

    pub async fn list(&self, entity_type: &EntityType) -> Result<Vec<Value>, SyncError> {
        let records = self
            .storage
            .get_all(&entity_type.cached_namespace())
            .await?;
        Ok(records.into_iter().map(|r| r.data).collect())
    }
}

/// Merged read view: cached server entities followed by offline creates
#[derive(Clone)]
pub struct OfflineReader {
    cache: EntityCache,
    shadows: ShadowStore,
}

impl OfflineReader {
    pub fn new(storage: Arc<dyn IStorageEngine>) -> Self {
        Self {
            cache: EntityCache::new(storage.clone()),
            shadows: ShadowStore::new(storage),
        }
    }

    /// Every entity of a type the user can see right now
    ///
    /// Offline creates carry `isOffline: true` and their `queueId`.
    pub async fn list(&self, entity_type: &EntityType) -> Result<Vec<Value>, SyncError> {
        let mut view = self.cache.list(entity_type).await?;
        view.extend(
            self.shadows
                .list(entity_type)
                .await?
                .iter()
                .map(|shadow| shadow.to_view()),
        );
        Ok(view)
    }

    /// One entity by id, looking at the cache first and then at shadows
    pub async fn get(&self, entity_type: &EntityType, id: &str) -> Result<Option<Value>, SyncError> {
        if let Some(entity) = self.cache.get(entity_type, id).await? {
            return Ok(Some(entity));
        }
        Ok(self
            .shadows
            .list(entity_type)
            .await?
            .iter()
            .find(|shadow| shadow.id() == id)
            .map(|shadow| shadow.to_view()))
    }
}

/// Copy of `payload` without its `id` field, used as a PATCH body
pub fn without_id(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| key.as_str() != "id")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(fields)
        }
        other => other.clone(),
    }
}
