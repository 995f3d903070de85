//! PBKDF2-HMAC-SHA256 key derivation from the device id
//!
//! The device id is the password; the salt is a fixed application
//! constant. The derived key is only as secret as the device id, which is
//! stored next to the ciphertext. This binds a session blob to the device
//! that wrote it; it does not protect against an attacker holding the
//! whole data directory.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use timegrid_core::domain::DeviceId;

/// Fixed application salt
pub const APP_SALT: &[u8] = b"timegrid.session-vault.v1";

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Length of the derived AES-256 key
pub const KEY_LEN: usize = 32;

/// 256-bit key bound to one device, zeroized on drop
pub struct DeviceKey {
    key: [u8; KEY_LEN],
}

impl DeviceKey {
    /// Derives the key for `device_id`
    ///
    /// CPU-bound; call it from a blocking thread.
    pub fn derive(device_id: &DeviceId, iterations: u32) -> Self {
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(device_id.as_str().as_bytes(), APP_SALT, iterations, &mut key);
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl Drop for DeviceKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DeviceKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic_per_device() {
        let a = DeviceId::new("device-a").unwrap();
        let b = DeviceId::new("device-b").unwrap();

        assert_eq!(
            DeviceKey::derive(&a, 1_000).as_bytes(),
            DeviceKey::derive(&a, 1_000).as_bytes()
        );
        assert_ne!(
            DeviceKey::derive(&a, 1_000).as_bytes(),
            DeviceKey::derive(&b, 1_000).as_bytes()
        );
        assert_ne!(
            DeviceKey::derive(&a, 1_000).as_bytes(),
            DeviceKey::derive(&a, 2_000).as_bytes()
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = DeviceKey::derive(&DeviceId::new("device-a").unwrap(), 1);
        assert_eq!(format!("{key:?}"), "DeviceKey(<redacted>)");
    }
}
