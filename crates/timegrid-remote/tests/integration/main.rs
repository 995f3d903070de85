//! Integration tests for timegrid-remote
//!
//! Uses wiremock to stand in for the entity API and checks request shapes,
//! status mapping, and a full queue drain through the REST client.

mod common;

mod test_drain;
mod test_entity_calls;
mod test_errors;
