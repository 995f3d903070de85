//! REST entity client
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use timegrid_remote::RestEntityClient;
//!
//! # fn example() -> Result<(), timegrid_remote::ClientBuildError> {
//! let client = RestEntityClient::with_base_url("https://app.timegrid.io/api")?
//!     .with_timeout(Duration::from_secs(10))?
//!     .with_access_token("token");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use timegrid_core::config::RemoteConfig;
use timegrid_core::domain::{EntityType, OperationId};
use timegrid_core::ports::{IEntityClient, RemoteError};

use crate::ClientBuildError;

/// Header carrying the queue id of a create
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Default transport timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in a `RemoteError` message
const MAX_ERROR_BODY: usize = 256;

// ============================================================================
// RestEntityClient
// ============================================================================

/// HTTP client for the entity collections
pub struct RestEntityClient {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
    send_idempotency_key: bool,
}

impl RestEntityClient {
    /// Creates a client for `base_url` with the default timeout
    pub fn with_base_url(base_url: &str) -> Result<Self, ClientBuildError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientBuildError::NotABase(base_url.to_string()));
        }

        Ok(Self {
            client: build_http_client(DEFAULT_TIMEOUT)?,
            base_url,
            access_token: None,
            send_idempotency_key: true,
        })
    }

    /// Creates a client from the `remote` configuration section
    pub fn from_config(config: &RemoteConfig) -> Result<Self, ClientBuildError> {
        let mut client =
            Self::with_base_url(&config.base_url)?.with_timeout(Duration::from_secs(config.timeout_secs))?;
        client.send_idempotency_key = config.send_idempotency_key;
        Ok(client)
    }

    /// Replaces the transport timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientBuildError> {
        self.client = build_http_client(timeout)?;
        Ok(self)
    }

    /// Sends `Authorization: Bearer <token>` on every request
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/{segments...}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, ClientBuildError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

// ============================================================================
// Error mapping
// ============================================================================

fn map_transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else if err.is_decode() {
        RemoteError::InvalidResponse(err.to_string())
    } else {
        RemoteError::Network(err.to_string())
    }
}

/// Passes 2xx responses through and maps everything else
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    if message.is_empty() {
        message = status.canonical_reason().unwrap_or("no body").to_string();
    }

    Err(status_error(status, message, retry_after))
}

fn status_error(status: StatusCode, message: String, retry_after: Option<String>) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited(match retry_after {
            Some(after) => format!("retry after {after}s"),
            None => message,
        }),
        s if s.is_server_error() => RemoteError::Server {
            status: s.as_u16(),
            message,
        },
        s => RemoteError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

// ============================================================================
// IEntityClient
// ============================================================================

#[async_trait::async_trait]
impl IEntityClient for RestEntityClient {
    #[tracing::instrument(skip(self, payload), fields(entity = %entity))]
    async fn create(
        &self,
        entity: &EntityType,
        payload: &Value,
        idempotency_key: &OperationId,
    ) -> Result<Value, RemoteError> {
        let mut request = self
            .request(Method::POST, self.endpoint(&[entity.as_str()]))
            .json(payload);
        if self.send_idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, idempotency_key.to_string());
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let response = check_status(response).await?;
        let created: Value = response.json().await.map_err(map_transport_error)?;

        if !created.is_object() {
            warn!(body = %created, "Create response is not an object");
            return Err(RemoteError::InvalidResponse(
                "expected the created entity as a JSON object".into(),
            ));
        }
        debug!("Entity created");
        Ok(created)
    }

    #[tracing::instrument(skip(self, partial), fields(entity = %entity))]
    async fn update(&self, entity: &EntityType, id: &str, partial: &Value) -> Result<(), RemoteError> {
        let response = self
            .request(Method::PATCH, self.endpoint(&[entity.as_str(), id]))
            .json(partial)
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(response).await?;
        debug!("Entity updated");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(entity = %entity))]
    async fn delete(&self, entity: &EntityType, id: &str) -> Result<(), RemoteError> {
        let response = self
            .request(Method::DELETE, self.endpoint(&[entity.as_str(), id]))
            .send()
            .await
            .map_err(map_transport_error)?;

        // Already gone is as good as deleted
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Entity already deleted");
            return Ok(());
        }
        check_status(response).await?;
        debug!("Entity deleted");
        Ok(())
    }
}
