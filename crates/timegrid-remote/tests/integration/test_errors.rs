//! Status and transport failures map onto RemoteError

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use timegrid_core::domain::OperationId;
use timegrid_core::ports::{IEntityClient, RemoteError};
use timegrid_remote::RestEntityClient;

use crate::common::{self, project, time_entry};

async fn mount_create(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/time_entry"))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn create(client: &RestEntityClient) -> RemoteError {
    client
        .create(&time_entry(), &json!({ "hours": 1 }), &OperationId::new())
        .await
        .expect_err("create should fail")
}

#[tokio::test]
async fn test_validation_failure_is_permanent() {
    let (server, client) = common::setup().await;
    mount_create(
        &server,
        ResponseTemplate::new(422).set_body_string("hours must be positive"),
    )
    .await;

    let err = create(&client).await;
    assert!(matches!(
        &err,
        RemoteError::Rejected { status: 422, message } if message == "hours must be positive"
    ));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = common::setup().await;
    mount_create(&server, ResponseTemplate::new(503)).await;

    let err = create(&client).await;
    assert!(matches!(err, RemoteError::Server { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let (server, client) = common::setup().await;
    mount_create(
        &server,
        ResponseTemplate::new(429).insert_header("Retry-After", "12"),
    )
    .await;

    match create(&client).await {
        RemoteError::RateLimited(message) => assert!(message.contains("12")),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let (server, client) = common::setup().await;
    Mock::given(method("PATCH"))
        .and(path("/api/project/7"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client
        .update(&project(), "7", &json!({ "name": "Renamed" }))
        .await
        .expect_err("update should fail");
    assert!(matches!(err, RemoteError::Unauthorized(_)));
}

#[tokio::test]
async fn test_create_requires_object_body() {
    let (server, client) = common::setup().await;
    mount_create(&server, ResponseTemplate::new(201).set_body_json(json!([1, 2]))).await;
    assert!(matches!(create(&client).await, RemoteError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_create_rejects_non_json_body() {
    let (server, client) = common::setup().await;
    mount_create(&server, ResponseTemplate::new(201).set_body_string("<html>ok</html>")).await;
    assert!(matches!(create(&client).await, RemoteError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let (server, _) = common::setup().await;
    mount_create(
        &server,
        ResponseTemplate::new(201)
            .set_body_json(json!({ "id": 1 }))
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let client = RestEntityClient::with_base_url(&format!("{}/api", server.uri()))
        .unwrap()
        .with_timeout(Duration::from_millis(200))
        .unwrap();

    let err = create(&client).await;
    assert!(matches!(err, RemoteError::Timeout));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let client = RestEntityClient::with_base_url(&format!("{uri}/api")).unwrap();

    let err = create(&client).await;
    assert!(matches!(err, RemoteError::Network(_)), "got {err:?}");
}
