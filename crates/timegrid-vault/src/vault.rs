//! SessionVault - encrypted session persistence
//!
//! ## Design Notes
//!
//! - Only [`EncryptedSessionBlob`] reaches storage. The serialized session
//!   lives in a zeroizing buffer between serialization and encryption.
//! - `decrypt` never fails loudly. Every rejection (version, device, tag,
//!   format, expiry) yields `None` and a debug log with the reason.
//! - One derived key per device id is cached for the life of the vault, so
//!   the PBKDF2 cost is paid once per process.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use rand::RngCore;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use timegrid_core::config::SessionConfig;
use timegrid_core::domain::{
    AuthSession, DeviceId, EncryptedSessionBlob, Record, NS_SESSION_ENCRYPTED,
    SESSION_BLOB_VERSION,
};
use timegrid_core::ports::{IClock, IStorageEngine, SystemClock};

use crate::cipher;
use crate::kdf::{DeviceKey, DEFAULT_ITERATIONS};
use crate::{DeviceIdentity, VaultError};

/// Record id of the cached session inside `session_encrypted`
pub const SESSION_RECORD_ID: &str = "current";

/// Tunables for the vault
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub kdf_iterations: u32,
    /// A session is rejected this long before it actually expires
    pub expiry_buffer: Duration,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_ITERATIONS,
            expiry_buffer: Duration::minutes(5),
        }
    }
}

impl From<&SessionConfig> for VaultSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            kdf_iterations: config.kdf_iterations,
            expiry_buffer: Duration::seconds(config.expiry_buffer_secs.min(u32::MAX as u64) as i64),
        }
    }
}

pub struct SessionVault {
    storage: Arc<dyn IStorageEngine>,
    identity: DeviceIdentity,
    settings: VaultSettings,
    clock: Arc<dyn IClock>,
    keys: Mutex<HashMap<DeviceId, Arc<DeviceKey>>>,
}

impl SessionVault {
    pub fn new(storage: Arc<dyn IStorageEngine>) -> Self {
        Self {
            identity: DeviceIdentity::new(storage.clone()),
            storage,
            settings: VaultSettings::default(),
            clock: Arc::new(SystemClock),
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_settings(mut self, settings: VaultSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn IClock>) -> Self {
        self.clock = clock;
        self
    }

    /// This device's id, created on first use
    pub async fn device_id(&self) -> Result<DeviceId, VaultError> {
        Ok(self.identity.get().await?)
    }

    /// Derives (or returns the cached) key for `device_id`
    ///
    /// The derivation runs on the blocking pool.
    pub async fn derive_key(&self, device_id: &DeviceId) -> Result<Arc<DeviceKey>, VaultError> {
        let mut keys = self.keys.lock().await;
        if let Some(key) = keys.get(device_id) {
            return Ok(key.clone());
        }

        let id = device_id.clone();
        let iterations = self.settings.kdf_iterations;
        let key = tokio::task::spawn_blocking(move || DeviceKey::derive(&id, iterations))
            .await
            .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

        let key = Arc::new(key);
        keys.insert(device_id.clone(), key.clone());
        debug!(device = ?device_id, iterations, "Derived device key");
        Ok(key)
    }

    /// Encrypts `session` for this device
    pub async fn encrypt(&self, session: &AuthSession) -> Result<EncryptedSessionBlob, VaultError> {
        let device_id = self.device_id().await?;
        if session.device_id != device_id {
            warn!(
                session_device = ?session.device_id,
                device = ?device_id,
                "Encrypting a session issued for another device; it will not decrypt"
            );
        }

        let key = self.derive_key(&device_id).await?;
        let plaintext = Zeroizing::new(serde_json::to_vec(session)?);
        let (iv, ciphertext) = cipher::seal(&key, &plaintext)?;

        Ok(EncryptedSessionBlob {
            version: SESSION_BLOB_VERSION,
            device_id: device_id.as_str().to_string(),
            iv: iv.to_vec(),
            ciphertext,
        })
    }

    /// Decrypts and validates `blob`
    ///
    /// Returns `None` for any blob that is not a live session for this
    /// device.
    pub async fn decrypt(&self, blob: &EncryptedSessionBlob) -> Option<AuthSession> {
        match self.open_blob(blob).await {
            Ok(session) => Some(session),
            Err(reason) => {
                debug!(reason = %reason, "Cached session rejected");
                None
            }
        }
    }

    async fn open_blob(&self, blob: &EncryptedSessionBlob) -> Result<AuthSession, VaultError> {
        if blob.version != SESSION_BLOB_VERSION {
            return Err(VaultError::Decryption(format!(
                "unsupported blob version {}",
                blob.version
            )));
        }

        let device_id = self.device_id().await?;
        if blob.device_id != device_id.as_str() {
            return Err(VaultError::Decryption("blob written by another device".into()));
        }

        let key = self.derive_key(&device_id).await?;
        let plaintext = cipher::open(&key, &blob.iv, &blob.ciphertext)?;
        let session: AuthSession = serde_json::from_slice(&plaintext)?;

        if session.device_id != device_id {
            return Err(VaultError::Decryption("session issued for another device".into()));
        }
        if session.is_expired(self.clock.now(), self.settings.expiry_buffer) {
            return Err(VaultError::Decryption(format!(
                "session expired at {}",
                session.expires_at
            )));
        }
        Ok(session)
    }

    /// Encrypts and persists `session`, replacing any cached one
    #[tracing::instrument(skip_all)]
    pub async fn store(&self, session: &AuthSession) -> Result<(), VaultError> {
        let blob = self.encrypt(session).await?;
        self.storage
            .put(
                NS_SESSION_ENCRYPTED,
                &Record::new(SESSION_RECORD_ID, serde_json::to_value(&blob)?),
            )
            .await?;
        info!(user = %session.user.id, expires_at = %session.expires_at, "Session cached");
        Ok(())
    }

    /// Reads and decrypts the cached session
    ///
    /// A blob that does not yield a valid session is cleared.
    #[tracing::instrument(skip_all)]
    pub async fn load(&self) -> Result<Option<AuthSession>, VaultError> {
        let Some(value) = self.storage.get(NS_SESSION_ENCRYPTED, SESSION_RECORD_ID).await? else {
            return Ok(None);
        };

        let session = match serde_json::from_value::<EncryptedSessionBlob>(value) {
            Ok(blob) => self.decrypt(&blob).await,
            Err(e) => {
                debug!(error = %e, "Cached session blob is malformed");
                None
            }
        };

        if session.is_none() {
            info!("Discarding unusable cached session");
            self.clear().await?;
        }
        Ok(session)
    }

    /// Removes the cached session
    ///
    /// The stored blob is first overwritten with random bytes of the same
    /// shape, then deleted.
    #[tracing::instrument(skip_all)]
    pub async fn clear(&self) -> Result<(), VaultError> {
        if let Some(value) = self.storage.get(NS_SESSION_ENCRYPTED, SESSION_RECORD_ID).await? {
            if let Ok(blob) = serde_json::from_value::<EncryptedSessionBlob>(value) {
                let scrubbed = EncryptedSessionBlob {
                    version: blob.version,
                    device_id: DeviceId::generate().as_str().to_string(),
                    iv: random_bytes(blob.iv.len()),
                    ciphertext: random_bytes(blob.ciphertext.len()),
                };
                self.storage
                    .put(
                        NS_SESSION_ENCRYPTED,
                        &Record::new(SESSION_RECORD_ID, serde_json::to_value(&scrubbed)?),
                    )
                    .await?;
            } else {
                self.storage
                    .put(NS_SESSION_ENCRYPTED, &Record::new(SESSION_RECORD_ID, Value::Null))
                    .await?;
            }
        }

        self.storage
            .delete(NS_SESSION_ENCRYPTED, SESSION_RECORD_ID)
            .await?;
        debug!("Cached session cleared");
        Ok(())
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
