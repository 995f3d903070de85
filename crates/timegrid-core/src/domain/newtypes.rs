//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Storage namespaces
// ============================================================================

/// Namespace holding the persisted mutation queue
pub const NS_SYNC_QUEUE: &str = "sync_queue";
/// Namespace holding the encrypted session blob
pub const NS_SESSION_ENCRYPTED: &str = "session_encrypted";
/// Namespace holding the device identifier
pub const NS_DEVICE_ID: &str = "device_id";
/// Namespace for storage bookkeeping (migration markers)
pub const NS_META: &str = "_meta";

/// Prefix of the server-authoritative mirror namespaces
pub const CACHED_PREFIX: &str = "cached_";
/// Prefix of the shadow record namespaces
pub const OFFLINE_PREFIX: &str = "offline_";

// ============================================================================
// OperationId
// ============================================================================

/// Identifier of a queued operation
///
/// Also used as the temporary local id of the shadow record created
/// alongside a queued `Create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Create a new random OperationId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an OperationId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for OperationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
    }
}

// ============================================================================
// EntityType
// ============================================================================

/// Name of a remote entity collection (e.g. `time_entry`, `project`)
///
/// Restricted to lowercase ASCII letters, digits and underscores so it can
/// be embedded in storage namespaces and REST paths without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityType(String);

impl EntityType {
    /// Creates a validated entity type
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= 64
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            && name.starts_with(|c: char| c.is_ascii_lowercase());
        if valid {
            Ok(Self(name))
        } else {
            Err(DomainError::InvalidEntityType(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace of the server-authoritative mirror (`cached_<entity>`)
    pub fn cached_namespace(&self) -> String {
        format!("{CACHED_PREFIX}{}", self.0)
    }

    /// Namespace of the shadow records awaiting sync (`offline_<entity>`)
    pub fn offline_namespace(&self) -> String {
        format!("{OFFLINE_PREFIX}{}", self.0)
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.0
    }
}

// ============================================================================
// DeviceId
// ============================================================================

/// Per-installation identifier used as key-derivation input
///
/// Never sent to the server.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Generates a fresh random device id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing device id
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidDeviceId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Device ids are key material inputs; keep them out of debug logs.
impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "DeviceId({prefix}…)")
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_id_roundtrip() {
        let id = OperationId::new();
        let parsed: OperationId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_operation_id_invalid() {
        assert!("not-a-uuid".parse::<OperationId>().is_err());
    }

    #[test]
    fn test_entity_type_valid() {
        let entity = EntityType::new("time_entry").unwrap();
        assert_eq!(entity.as_str(), "time_entry");
        assert_eq!(entity.cached_namespace(), "cached_time_entry");
        assert_eq!(entity.offline_namespace(), "offline_time_entry");
    }

    #[test]
    fn test_entity_type_rejects_bad_names() {
        assert!(EntityType::new("").is_err());
        assert!(EntityType::new("Time Entry").is_err());
        assert!(EntityType::new("projects/1").is_err());
        assert!(EntityType::new("_hidden").is_err());
        assert!(EntityType::new("1project").is_err());
    }

    #[test]
    fn test_entity_type_serde_validates() {
        let ok: EntityType = serde_json::from_str("\"invoice\"").unwrap();
        assert_eq!(ok.as_str(), "invoice");
        assert!(serde_json::from_str::<EntityType>("\"In Voice\"").is_err());
    }

    #[test]
    fn test_device_id() {
        let generated = DeviceId::generate();
        assert!(!generated.as_str().is_empty());
        assert!(DeviceId::new("").is_err());
        assert!(DeviceId::new("has space").is_err());
        assert_eq!(DeviceId::new("dev-1").unwrap().as_str(), "dev-1");
    }

    #[test]
    fn test_device_id_debug_is_truncated() {
        let id = DeviceId::new("0123456789abcdef").unwrap();
        let debug = format!("{id:?}");
        assert!(debug.contains("01234567"));
        assert!(!debug.contains("89abcdef"));
    }
}
