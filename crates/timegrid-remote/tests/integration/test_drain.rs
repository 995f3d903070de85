//! Offline writes drained through the REST client

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use timegrid_cache::MemoryEngine;
use timegrid_core::domain::OperationKind;
use timegrid_core::ports::NullEventSink;
use timegrid_sync::{
    DrainOutcome, EntityCache, HandlerRegistry, MutationQueue, NetworkMonitor,
    OrchestratorSettings, SyncOrchestrator,
};

use crate::common::{self, time_entry};

#[tokio::test]
async fn test_offline_creates_reach_server_when_online() {
    let (server, client) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/api/time_entry"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "srv-1",
            "hours": 1
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/time_entry/srv-9"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let engine = Arc::new(MemoryEngine::default());
    let queue = Arc::new(MutationQueue::open(engine.clone()).await.unwrap());
    let network = Arc::new(NetworkMonitor::new(false));
    let mut handlers = HandlerRegistry::new();
    handlers.register_entity(time_entry(), Arc::new(client));

    let orchestrator = SyncOrchestrator::new(
        engine.clone(),
        queue.clone(),
        handlers,
        network.clone(),
        Arc::new(NullEventSink),
    )
    .with_settings(OrchestratorSettings {
        max_retries: 3,
        request_spacing: Duration::ZERO,
    });

    for _ in 0..2 {
        orchestrator
            .submit(OperationKind::Create, time_entry(), json!({ "hours": 1 }))
            .await
            .unwrap();
    }
    orchestrator
        .submit(
            OperationKind::Update,
            time_entry(),
            json!({ "id": "srv-9", "hours": 4 }),
        )
        .await
        .unwrap();
    assert_eq!(queue.size().await, 3);

    network.set_online(true);
    let summary = match orchestrator.drain().await {
        DrainOutcome::Completed(summary) => summary,
        other => panic!("expected a completed drain, got {other:?}"),
    };

    assert_eq!(summary.synced_count, 2);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(summary.dropped_count, 0);
    // The 500 keeps the update queued for the next pass
    assert_eq!(summary.remaining_queue_size, 1);

    let cached = EntityCache::new(engine).get(&time_entry(), "srv-1").await.unwrap();
    assert_eq!(cached, Some(json!({ "id": "srv-1", "hours": 1 })));
}
