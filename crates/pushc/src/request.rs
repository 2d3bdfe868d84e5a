//! Authenticated request construction.
//!
//! Building a request never touches the network: the result is a plain
//! value that the [`Executor`](crate::executor::Executor) later sends.

use crate::error::PushError;
use push_common::auth::basic_credential;
use push_common::path::{self, PathError};
use reqwest::{Method, Url};
use serde::Serialize;
use std::sync::Arc;

/// Content type of JSON request bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Content type of raw attachment bytes.
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// The account the client acts as.
///
/// Fixed for the lifetime of a client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    principal: String,
    secret: Option<String>,
}

impl ClientIdentity {
    /// Creates an identity. An empty secret means requests carry no
    /// `Authorization` header.
    pub fn new(principal: impl Into<String>, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            principal: principal.into(),
            secret: (!secret.is_empty()).then_some(secret),
        }
    }

    /// Account number or id.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// `Authorization` header value, if a secret is configured.
    pub fn authorization(&self) -> Option<String> {
        self.secret
            .as_deref()
            .map(|secret| basic_credential(&self.principal, secret))
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("principal", &self.principal)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Serialized JSON document.
    Json(String),
    /// Raw attachment bytes.
    Binary(Vec<u8>),
}

impl RequestBody {
    /// Serializes `value` into a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::MalformedBody`] if serialization fails.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, PushError> {
        Ok(Self::Json(serde_json::to_string(value)?))
    }

    /// Size of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Json(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Returns `true` for a zero-length body.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Json(s) => s.into_bytes(),
            Self::Binary(b) => b,
        }
    }
}

/// Which trust policy a request is sent under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The push service itself; pinned trust when enforced.
    Service,
    /// A server-issued absolute URL (attachment storage, snapshot CDN);
    /// system trust, never authenticated.
    External,
}

/// A fully configured request, ready for the executor.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute target URL.
    pub url: Url,
    /// Trust policy for the TLS handshake.
    pub destination: Destination,
    /// `Authorization` header value.
    pub authorization: Option<String>,
    /// Optional body.
    pub body: Option<RequestBody>,
}

impl PushRequest {
    /// Builds an unauthenticated request to a server-issued URL.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Protocol`] if `url` is not an absolute http(s)
    /// URL.
    pub fn external(method: Method, url: &str, body: Option<RequestBody>) -> Result<Self, PushError> {
        let url = Url::parse(url)
            .map_err(|e| PushError::Protocol(format!("invalid external URL {url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PushError::Protocol(format!(
                "unsupported external URL scheme: {}",
                url.scheme()
            )));
        }
        Ok(Self {
            method,
            url,
            destination: Destination::External,
            authorization: None,
            body,
        })
    }

    /// Path component of the target URL.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Declared content type: octet-stream for raw bytes, JSON for every
    /// other service request, none for a bodiless external request.
    pub fn content_type(&self) -> Option<&'static str> {
        match (&self.body, self.destination) {
            (Some(RequestBody::Binary(_)), _) => Some(CONTENT_TYPE_OCTET_STREAM),
            (Some(RequestBody::Json(_)), _) | (None, Destination::Service) => {
                Some(CONTENT_TYPE_JSON)
            }
            (None, Destination::External) => None,
        }
    }
}

/// Builds authenticated requests against the service base URL.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base: String,
    prefix: String,
    identity: Arc<ClientIdentity>,
}

impl RequestBuilder {
    /// Creates a builder for the service at `service_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Config`] if `service_url` is not an absolute
    /// http(s) URL.
    pub fn new(service_url: &str, identity: Arc<ClientIdentity>) -> Result<Self, PushError> {
        let parsed = Url::parse(service_url)
            .map_err(|e| PushError::Config(format!("invalid service URL {service_url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PushError::Config(format!(
                "service URL must be http or https, got: {}",
                parsed.scheme()
            )));
        }
        Ok(Self {
            base: service_url.trim_end_matches('/').to_string(),
            prefix: parsed.path().trim_end_matches('/').to_string(),
            identity,
        })
    }

    /// The identity requests are authenticated as.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Renders `template` with `args` and wraps it in a request carrying the
    /// current credential.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::InvalidPath`] if the arguments do not fit the
    /// template or the URL would not carry the rendered path unchanged.
    pub fn build(
        &self,
        template: &str,
        args: &[&str],
        method: Method,
        body: Option<RequestBody>,
    ) -> Result<PushRequest, PushError> {
        let path = path::render(template, args)?;
        let url = Url::parse(&format!("{}{path}", self.base))
            .map_err(|e| PushError::Config(format!("cannot form request URL: {e}")))?;
        let rendered = format!("{}{path}", self.prefix);
        if url.path() != rendered {
            return Err(PathError::Rewritten {
                rendered,
                sent: url.path().to_string(),
            }
            .into());
        }

        Ok(PushRequest {
            method,
            url,
            destination: Destination::Service,
            authorization: self.identity.authorization(),
            body,
        })
    }
}
