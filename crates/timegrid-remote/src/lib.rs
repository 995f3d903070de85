//! TimeGrid Remote - REST adapter for the entity API
//!
//! Implements [`IEntityClient`](timegrid_core::ports::IEntityClient) over
//! HTTP with `reqwest`:
//!
//! - `POST   {base}/{entity}` creates and returns the server entity
//! - `PATCH  {base}/{entity}/{id}` applies a partial update
//! - `DELETE {base}/{entity}/{id}` deletes
//!
//! HTTP statuses and transport failures are mapped onto
//! [`RemoteError`](timegrid_core::ports::RemoteError) so the orchestrator
//! can tell transient failures from permanent rejections.

pub mod client;

pub use client::RestEntityClient;

use thiserror::Error;

/// Errors building a [`RestEntityClient`]
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("Base URL cannot carry a path: {0}")]
    NotABase(String),

    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}
