//! TimeGrid Vault - Offline session cache
//!
//! Keeps the authenticated session on disk so the client can start signed
//! in without a network round trip, without ever writing the session in
//! plaintext.
//!
//! ## Scheme
//!
//! - Device identity: a random UUID created once and kept under
//!   `device_id/current`; it never leaves the device.
//! - Key: PBKDF2-HMAC-SHA256 over the device id with a fixed application
//!   salt, 32 bytes, derived on a blocking thread and cached per process.
//! - Cipher: AES-256-GCM with a fresh 96-bit IV per encryption.
//!
//! ## Modules
//!
//! - [`device`] - `DeviceIdentity`, the stable per-device id
//! - [`kdf`] - `DeviceKey` derivation
//! - [`cipher`] - AES-256-GCM seal/open
//! - [`vault`] - `SessionVault` (encrypt, decrypt, store, load, clear)

pub mod cipher;
pub mod device;
pub mod kdf;
pub mod vault;

pub use device::DeviceIdentity;
pub use kdf::DeviceKey;
pub use vault::{SessionVault, VaultSettings};

use thiserror::Error;

use timegrid_core::ports::StorageError;

/// Errors inside the vault
///
/// `SessionVault::decrypt` and `load` turn every cryptographic failure into
/// "no session"; only storage failures reach callers.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
