//! Request shapes for create, update, and delete

use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

use timegrid_core::domain::OperationId;
use timegrid_core::ports::IEntityClient;
use timegrid_remote::client::IDEMPOTENCY_HEADER;

use crate::common::{self, time_entry, TEST_TOKEN};

#[tokio::test]
async fn test_create_posts_payload_with_idempotency_key() {
    let (server, client) = common::setup().await;
    let op_id = OperationId::new();
    let payload = json!({ "hours": 2.5, "note": "standup" });

    Mock::given(method("POST"))
        .and(path("/api/time_entry"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(header(IDEMPOTENCY_HEADER, op_id.to_string().as_str()))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9001,
            "hours": 2.5,
            "note": "standup"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client
        .create(&time_entry(), &payload, &op_id)
        .await
        .expect("create failed");
    assert_eq!(created["id"], 9001);
}

#[tokio::test]
async fn test_update_patches_by_id() {
    let (server, client) = common::setup().await;

    Mock::given(method("PATCH"))
        .and(path("/api/time_entry/42"))
        .and(body_json(json!({ "hours": 3 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .update(&time_entry(), "42", &json!({ "hours": 3 }))
        .await
        .expect("update failed");
}

#[tokio::test]
async fn test_delete_by_id() {
    let (server, client) = common::setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/time_entry/42"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .delete(&time_entry(), "42")
        .await
        .expect("delete failed");
}

#[tokio::test]
async fn test_delete_of_missing_entity_succeeds() {
    let (server, client) = common::setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/time_entry/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client.delete(&time_entry(), "gone").await.is_ok());
}
