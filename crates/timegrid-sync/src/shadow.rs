//! Optimistic shadow records
//!
//! A `Create` queued while offline gets a [`ShadowRecord`] in the
//! `offline_<entity>` namespace so list screens can show it before the
//! server has seen it. The shadow is removed when its operation is
//! committed or dropped.
//!
//! Queue removal and shadow deletion are two separate writes. If the
//! process stops between them, the shadow outlives its operation;
//! [`ShadowStore::sweep_orphans`] removes such leftovers at startup.

use std::sync::Arc;

use tracing::{debug, info, warn};

use timegrid_core::domain::{EntityType, OperationId, ShadowRecord};
use timegrid_core::ports::IStorageEngine;

use crate::{MutationQueue, SyncError};

/// Reads and writes shadow records
#[derive(Clone)]
pub struct ShadowStore {
    storage: Arc<dyn IStorageEngine>,
}

impl ShadowStore {
    pub fn new(storage: Arc<dyn IStorageEngine>) -> Self {
        Self { storage }
    }

    /// Stores (or replaces) a shadow record
    pub async fn put(&self, shadow: &ShadowRecord) -> Result<(), SyncError> {
        let record = shadow.to_record()?;
        self.storage
            .put(&shadow.entity_type().offline_namespace(), &record)
            .await?;
        debug!(entity = %shadow.entity_type(), id = shadow.id(), "Shadow record stored");
        Ok(())
    }

    /// Deletes the shadow created for `queue_id`
    pub async fn remove(&self, entity_type: &EntityType, queue_id: &OperationId) -> Result<(), SyncError> {
        self.storage
            .delete(&entity_type.offline_namespace(), &queue_id.to_string())
            .await?;
        Ok(())
    }

    /// All shadows of an entity type, in creation order
    pub async fn list(&self, entity_type: &EntityType) -> Result<Vec<ShadowRecord>, SyncError> {
        let records = self
            .storage
            .get_all(&entity_type.offline_namespace())
            .await?;

        Ok(records
            .iter()
            .filter_map(|record| match ShadowRecord::from_record(record) {
                Ok(shadow) => Some(shadow),
                Err(e) => {
                    warn!(entity = %entity_type, id = %record.id, error = %e, "Skipping malformed shadow record");
                    None
                }
            })
            .collect())
    }

    /// Deletes shadows whose operation is no longer queued
    ///
    /// Returns the number of records removed.
    pub async fn sweep_orphans(
        &self,
        queue: &MutationQueue,
        entity_types: &[EntityType],
    ) -> Result<usize, SyncError> {
        let mut removed = 0;
        for entity_type in entity_types {
            let namespace = entity_type.offline_namespace();
            for record in self.storage.get_all(&namespace).await? {
                let orphaned = match ShadowRecord::from_record(&record) {
                    Ok(shadow) => queue.get(shadow.queue_id()).await.is_none(),
                    // Unreadable shadows can never be matched to an operation
                    Err(_) => true,
                };
                if orphaned {
                    self.storage.delete(&namespace, &record.id).await?;
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!(removed, "Swept orphaned shadow records");
        }
        Ok(removed)
    }
}
