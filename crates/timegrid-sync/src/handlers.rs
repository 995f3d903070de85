//! Typed operation handlers
//!
//! The orchestrator dispatches each queued operation to the handler
//! registered for its `(entity type, operation kind)` pair. The registry is
//! built once at startup; an operation with no handler is a permanent
//! failure.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use timegrid_core::domain::{EntityType, OperationKind, QueuedOperation};
use timegrid_core::ports::{ApplyOutcome, IEntityClient, IOperationHandler, RemoteError};

use crate::cache::without_id;

/// Lookup table from `(entity type, kind)` to handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(EntityType, OperationKind), Arc<dyn IOperationHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a handler, replacing any previous one for the same pair
    pub fn register(
        &mut self,
        entity_type: EntityType,
        kind: OperationKind,
        handler: Arc<dyn IOperationHandler>,
    ) -> &mut Self {
        debug!(entity = %entity_type, %kind, "Registering operation handler");
        self.handlers.insert((entity_type, kind), handler);
        self
    }

    /// Installs create, update and delete handlers backed by `client`
    pub fn register_entity(
        &mut self,
        entity_type: EntityType,
        client: Arc<dyn IEntityClient>,
    ) -> &mut Self {
        self.register(
            entity_type.clone(),
            OperationKind::Create,
            Arc::new(CreateHandler::new(client.clone())),
        );
        self.register(
            entity_type.clone(),
            OperationKind::Update,
            Arc::new(UpdateHandler::new(client.clone())),
        );
        self.register(
            entity_type,
            OperationKind::Delete,
            Arc::new(DeleteHandler::new(client)),
        )
    }

    /// Handler for a pair, if registered
    pub fn get(&self, entity_type: &EntityType, kind: OperationKind) -> Option<Arc<dyn IOperationHandler>> {
        self.handlers.get(&(entity_type.clone(), kind)).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ============================================================================
// Entity client handlers
// ============================================================================

fn remote_id(op: &QueuedOperation) -> Result<String, RemoteError> {
    op.require_remote_id()
        .map_err(|e| RemoteError::InvalidOperation(e.to_string()))
}

/// `POST /{entity}`; the operation id doubles as the idempotency key
pub struct CreateHandler {
    client: Arc<dyn IEntityClient>,
}

impl CreateHandler {
    pub fn new(client: Arc<dyn IEntityClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IOperationHandler for CreateHandler {
    async fn apply(&self, op: &QueuedOperation) -> Result<ApplyOutcome, RemoteError> {
        let created = self
            .client
            .create(op.entity_type(), op.payload(), op.id())
            .await?;
        Ok(ApplyOutcome::Created(created))
    }
}

/// `PATCH /{entity}/{id}` with the payload minus its `id`
pub struct UpdateHandler {
    client: Arc<dyn IEntityClient>,
}

impl UpdateHandler {
    pub fn new(client: Arc<dyn IEntityClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IOperationHandler for UpdateHandler {
    async fn apply(&self, op: &QueuedOperation) -> Result<ApplyOutcome, RemoteError> {
        let id = remote_id(op)?;
        self.client
            .update(op.entity_type(), &id, &without_id(op.payload()))
            .await?;
        Ok(ApplyOutcome::Updated)
    }
}

/// `DELETE /{entity}/{id}`
pub struct DeleteHandler {
    client: Arc<dyn IEntityClient>,
}

impl DeleteHandler {
    pub fn new(client: Arc<dyn IEntityClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IOperationHandler for DeleteHandler {
    async fn apply(&self, op: &QueuedOperation) -> Result<ApplyOutcome, RemoteError> {
        let id = remote_id(op)?;
        self.client.delete(op.entity_type(), &id).await?;
        Ok(ApplyOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{json, Value};
    use timegrid_core::domain::OperationId;

    use super::*;

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl IEntityClient for RecordingClient {
        async fn create(
            &self,
            entity: &EntityType,
            payload: &Value,
            idempotency_key: &OperationId,
        ) -> Result<Value, RemoteError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("POST /{entity} key={idempotency_key}"));
            let mut created = payload.clone();
            created["id"] = json!(42);
            Ok(created)
        }

        async fn update(&self, entity: &EntityType, id: &str, partial: &Value) -> Result<(), RemoteError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("PATCH /{entity}/{id} {partial}"));
            Ok(())
        }

        async fn delete(&self, entity: &EntityType, id: &str) -> Result<(), RemoteError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("DELETE /{entity}/{id}"));
            Ok(())
        }
    }

    fn invoice() -> EntityType {
        EntityType::new("invoice").unwrap()
    }

    #[tokio::test]
    async fn test_register_entity_installs_all_kinds() {
        let client = Arc::new(RecordingClient::default());
        let mut registry = HandlerRegistry::new();
        registry.register_entity(invoice(), client.clone());
        assert_eq!(registry.len(), 3);

        let now = chrono::Utc::now();
        let create = QueuedOperation::new(OperationKind::Create, invoice(), json!({"total": 10}), now);
        let update = QueuedOperation::new(OperationKind::Update, invoice(), json!({"id": 7, "total": 12}), now);
        let delete = QueuedOperation::new(OperationKind::Delete, invoice(), json!({"id": "7"}), now);

        let outcome = registry
            .get(&invoice(), OperationKind::Create)
            .unwrap()
            .apply(&create)
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Created(json!({"total": 10, "id": 42})));
        assert_eq!(
            registry.get(&invoice(), OperationKind::Update).unwrap().apply(&update).await,
            Ok(ApplyOutcome::Updated)
        );
        assert_eq!(
            registry.get(&invoice(), OperationKind::Delete).unwrap().apply(&delete).await,
            Ok(ApplyOutcome::Deleted)
        );

        let calls = client.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                format!("POST /invoice key={}", create.id()),
                r#"PATCH /invoice/7 {"total":12}"#.to_string(),
                "DELETE /invoice/7".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_without_id_is_invalid() {
        let handler = UpdateHandler::new(Arc::new(RecordingClient::default()));
        let op = QueuedOperation::new(OperationKind::Update, invoice(), json!({"total": 1}), chrono::Utc::now());
        assert!(matches!(
            handler.apply(&op).await,
            Err(RemoteError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_unregistered_pair() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(&invoice(), OperationKind::Create).is_none());
    }
}
