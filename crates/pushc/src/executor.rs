//! Request execution and status classification.
//!
//! Each call opens its own connection (the idle pool is disabled) and the
//! connection is released when the response is dropped, on success and
//! error paths alike.

use crate::config::TransportConfig;
use crate::error::PushError;
use crate::request::{Destination, PushRequest, RequestBody};
use crate::trust::PinnedTrustContext;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

/// Status the service uses to signal rate limiting.
pub const RATE_LIMIT_STATUS: u16 = 413;

/// A successful, fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response body.
    pub body: String,
    /// Value of the requested response header, if present.
    pub header: Option<String>,
}

impl Response {
    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::MalformedBody`] if the body is not valid JSON
    /// for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, PushError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends built requests and classifies their outcome.
#[derive(Debug, Clone)]
pub struct Executor {
    service: Client,
    external: Client,
}

impl Executor {
    /// Builds the HTTP clients. Service requests use `trust` when pinning is
    /// enforced; external URLs always use system trust.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Config`] if pinning is enforced without a trust
    /// context, or if the TLS backend rejects the configuration.
    pub fn new(
        config: &TransportConfig,
        trust: Option<&PinnedTrustContext>,
    ) -> Result<Self, PushError> {
        let service = if config.enforce_tls_pinning {
            let trust = trust.ok_or_else(|| {
                PushError::Config(
                    "TLS pinning is enforced but no trust store was loaded".to_string(),
                )
            })?;
            base_builder(config).use_preconfigured_tls(trust.tls_config())
        } else {
            base_builder(config)
        }
        .build()
        .map_err(|e| PushError::Config(format!("failed to build HTTP client: {e}")))?;

        let external = base_builder(config)
            .build()
            .map_err(|e| PushError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { service, external })
    }

    /// Sends `request`, requires status 200, and buffers the body together
    /// with the value of `header` when asked for.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::RateLimited`] on 413 from the service,
    /// [`PushError::Transport`] on any other non-200 status, and
    /// [`PushError::Connection`] if the exchange itself fails.
    pub fn execute(&self, request: PushRequest, header: Option<&str>) -> Result<Response, PushError> {
        let response = self.open(request)?;
        let header = header.and_then(|name| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        });
        let body = response.text()?;
        Ok(Response { body, header })
    }

    /// Sends `request` and returns the unread response once its status is
    /// known to be 200. Used for streaming downloads.
    ///
    /// # Errors
    ///
    /// Same classification as [`execute`](Self::execute).
    pub fn open(&self, request: PushRequest) -> Result<reqwest::blocking::Response, PushError> {
        let content_type = request.content_type();
        let PushRequest {
            method,
            url,
            destination,
            authorization,
            body,
        } = request;
        let client = match destination {
            Destination::Service => &self.service,
            Destination::External => &self.external,
        };

        debug!(%method, path = url.path(), ?destination, "push request");

        let mut builder = client.request(method.clone(), url.clone());
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        if let Some(body) = body {
            match &body {
                RequestBody::Json(json) => trace!(%method, body = %json, "request body"),
                RequestBody::Binary(bytes) => trace!(len = bytes.len(), "binary request body"),
            }
            builder = builder.body(body.into_bytes());
        }

        let response = builder.send()?;
        let status = response.status();
        debug!(status = status.as_u16(), path = url.path(), "push response");

        classify(status, destination)?;
        Ok(response)
    }
}

fn base_builder(config: &TransportConfig) -> ClientBuilder {
    Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.clone())
        .pool_max_idle_per_host(0)
}

/// Maps a status onto the success / rate-limited / failure outcomes.
/// Server-issued external URLs have no rate-limit semantics.
fn classify(status: StatusCode, destination: Destination) -> Result<(), PushError> {
    if status == StatusCode::OK {
        return Ok(());
    }
    if destination == Destination::Service && status.as_u16() == RATE_LIMIT_STATUS {
        return Err(PushError::RateLimited {
            status: status.as_u16(),
        });
    }
    Err(PushError::Transport {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("").to_string(),
    })
}
