//! Stable per-device identifier
//!
//! Created once, stored under `device_id/current`, cached in memory for
//! the life of the value. It is never sent to the server.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use timegrid_core::domain::{DeviceId, Record, NS_DEVICE_ID};
use timegrid_core::ports::{IStorageEngine, StorageError};

/// Record id of the device identifier inside `device_id`
pub const DEVICE_RECORD_ID: &str = "current";

pub struct DeviceIdentity {
    storage: Arc<dyn IStorageEngine>,
    cached: OnceCell<DeviceId>,
}

impl DeviceIdentity {
    pub fn new(storage: Arc<dyn IStorageEngine>) -> Self {
        Self {
            storage,
            cached: OnceCell::new(),
        }
    }

    /// The device id, created and persisted on first use
    pub async fn get(&self) -> Result<DeviceId, StorageError> {
        self.cached
            .get_or_try_init(|| self.load_or_create())
            .await
            .cloned()
    }

    async fn load_or_create(&self) -> Result<DeviceId, StorageError> {
        match self.storage.get(NS_DEVICE_ID, DEVICE_RECORD_ID).await? {
            Some(Value::String(stored)) => match DeviceId::new(stored) {
                Ok(id) => return Ok(id),
                Err(e) => warn!(error = %e, "Stored device id is invalid, replacing it"),
            },
            Some(_) => warn!("Stored device id has an unexpected shape, replacing it"),
            None => {}
        }

        let id = DeviceId::generate();
        self.storage
            .put(
                NS_DEVICE_ID,
                &Record::new(DEVICE_RECORD_ID, Value::String(id.as_str().to_string())),
            )
            .await?;
        info!(device = ?id, "Generated new device id");
        Ok(id)
    }
}
