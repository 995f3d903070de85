//! AES-256-GCM encryption for session blobs
//!
//! - 256-bit key ([`DeviceKey`])
//! - 96-bit (12 byte) random IV per encryption
//! - the 128-bit authentication tag stays appended to the ciphertext

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use zeroize::Zeroizing;

use crate::{DeviceKey, VaultError};

/// IV length in bytes
pub const IV_LEN: usize = 12;

/// Encrypts `plaintext` under a fresh random IV
///
/// Returns `(iv, ciphertext || tag)`.
pub fn seal(key: &DeviceKey, plaintext: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>), VaultError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    Ok((nonce.into(), ciphertext))
}

/// Decrypts and authenticates `ciphertext`
///
/// The plaintext buffer is zeroized when dropped.
pub fn open(key: &DeviceKey, iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if iv.len() != IV_LEN {
        return Err(VaultError::Decryption(format!(
            "IV must be {IV_LEN} bytes, got {}",
            iv.len()
        )));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| VaultError::Decryption("authentication failed".to_string()))?;

    Ok(Zeroizing::new(plaintext))
}
