//! Shared helpers for the REST client tests

use wiremock::MockServer;

use timegrid_core::domain::EntityType;
use timegrid_remote::RestEntityClient;

/// Access token the helpers configure on the client
pub const TEST_TOKEN: &str = "test-access-token";

/// Starts a mock server under `/api` and returns a client pointing at it
pub async fn setup() -> (MockServer, RestEntityClient) {
    let server = MockServer::start().await;
    let client = RestEntityClient::with_base_url(&format!("{}/api", server.uri()))
        .expect("mock server uri is a valid base")
        .with_access_token(TEST_TOKEN);
    (server, client)
}

pub fn time_entry() -> EntityType {
    EntityType::new("time_entry").unwrap()
}

pub fn project() -> EntityType {
    EntityType::new("project").unwrap()
}
