//! Storage record and shadow record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::{EntityType, OperationId};
use super::operation::QueuedOperation;

/// Reads the `id` field of an entity document as a string
///
/// Numeric ids are rendered as strings; empty strings count as absent.
pub fn entity_id(document: &Value) -> Option<String> {
    match document.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The unit stored by a storage engine: an id and an opaque JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub data: Value,
}

impl Record {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Approximate stored size in bytes (id plus serialized document)
    pub fn approximate_size(&self) -> u64 {
        let body = serde_json::to_vec(&self.data).map(|v| v.len()).unwrap_or(0);
        (self.id.len() + body) as u64
    }
}

// ============================================================================
// ShadowRecord
// ============================================================================

/// Optimistic local copy of an entity created while offline
///
/// Shown to the user before the server has confirmed the write. Lives in
/// the `offline_<entity>` namespace and points back at the queued `Create`
/// through `queue_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowRecord {
    id: String,
    entity_type: EntityType,
    data: Value,
    is_offline: bool,
    queue_id: OperationId,
    created_at: DateTime<Utc>,
}

impl ShadowRecord {
    /// Builds the shadow record for a queued `Create`
    ///
    /// The shadow takes the operation id as its temporary local id.
    pub fn for_operation(op: &QueuedOperation) -> Self {
        Self {
            id: op.id().to_string(),
            entity_type: op.entity_type().clone(),
            data: op.payload().clone(),
            is_offline: true,
            queue_id: *op.id(),
            created_at: op.enqueued_at(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn is_offline(&self) -> bool {
        self.is_offline
    }

    pub fn queue_id(&self) -> &OperationId {
        &self.queue_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Converts to the storage representation
    pub fn to_record(&self) -> Result<Record, DomainError> {
        let data = serde_json::to_value(self)
            .map_err(|e| DomainError::ValidationFailed(format!("shadow record: {e}")))?;
        Ok(Record::new(self.id.clone(), data))
    }

    /// Parses the storage representation
    pub fn from_record(record: &Record) -> Result<Self, DomainError> {
        serde_json::from_value(record.data.clone())
            .map_err(|e| DomainError::ValidationFailed(format!("shadow record: {e}")))
    }

    /// The view exposed to list screens: entity data plus offline markers
    pub fn to_view(&self) -> Value {
        let mut view = match &self.data {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        view.insert("id".to_string(), Value::String(self.id.clone()));
        view.insert("isOffline".to_string(), Value::Bool(true));
        view.insert("queueId".to_string(), Value::String(self.queue_id.to_string()));
        Value::Object(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::operation::OperationKind;
    use serde_json::json;

    fn create_op() -> QueuedOperation {
        QueuedOperation::new(
            OperationKind::Create,
            EntityType::new("time_entry").unwrap(),
            json!({"description": "Design review", "hours": 1.5}),
            Utc::now(),
        )
    }

    #[test]
    fn test_shadow_for_operation() {
        let op = create_op();
        let shadow = ShadowRecord::for_operation(&op);
        assert_eq!(shadow.id(), op.id().to_string());
        assert_eq!(shadow.queue_id(), op.id());
        assert!(shadow.is_offline());
        assert_eq!(shadow.data(), op.payload());
    }

    #[test]
    fn test_shadow_record_conversion() {
        let shadow = ShadowRecord::for_operation(&create_op());
        let record = shadow.to_record().unwrap();
        assert_eq!(record.id, shadow.id());
        assert_eq!(record.data["isOffline"], true);
        assert_eq!(ShadowRecord::from_record(&record).unwrap(), shadow);
    }

    #[test]
    fn test_shadow_view_marks_offline() {
        let shadow = ShadowRecord::for_operation(&create_op());
        let view = shadow.to_view();
        assert_eq!(view["isOffline"], true);
        assert_eq!(view["description"], "Design review");
        assert_eq!(view["id"], shadow.id());
    }

    #[test]
    fn test_record_size() {
        let record = Record::new("k", json!({"a": 1}));
        assert_eq!(record.approximate_size(), 1 + "{\"a\":1}".len() as u64);
    }

    #[test]
    fn test_entity_id_forms() {
        assert_eq!(entity_id(&json!({"id": "p-1"})).as_deref(), Some("p-1"));
        assert_eq!(entity_id(&json!({"id": 7})).as_deref(), Some("7"));
        assert!(entity_id(&json!({"id": ""})).is_none());
        assert!(entity_id(&json!({"id": null})).is_none());
        assert!(entity_id(&json!([1, 2])).is_none());
    }
}
