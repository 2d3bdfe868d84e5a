use push_common::PathError;
use thiserror::Error;

/// Coarse outcome classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Broken build artifact or configuration; the client cannot run.
    Fatal,
    /// The service asked the caller to slow down (HTTP 413).
    RateLimited,
    /// Any other failed round trip, including protocol violations.
    Transport,
    /// The message was accepted but some recipients were not reached.
    PartialDelivery,
}

/// Errors that can occur while talking to the push service.
#[derive(Error, Debug)]
pub enum PushError {
    /// The bundled trust store could not be opened, decrypted, or parsed.
    #[error("trust store error: {0}")]
    TrustStore(String),
    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The service rejected the request with its rate-limit status.
    #[error("rate limit exceeded: {status}")]
    RateLimited {
        /// HTTP status returned by the service.
        status: u16,
    },
    /// The service answered with a status other than 200.
    #[error("bad response: {status} {reason}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Reason phrase for the status.
        reason: String,
    },
    /// The response was well-formed HTTP but violated the push protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// The request could not be sent or its response could not be read.
    #[error("connection error: {0}")]
    Connection(#[from] reqwest::Error),
    /// Local file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A response body was not the JSON the protocol requires.
    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),
    /// One or more recipients could not be delivered to.
    #[error("send failure: {recipient}")]
    PartialDelivery {
        /// First recipient the service reported as failed.
        recipient: String,
        /// Every failed recipient, in server order.
        failed: Vec<String>,
    },
    /// A message was submitted without recipients.
    #[error("message has no recipients")]
    NoRecipients,
    /// A path argument could not be placed into its endpoint template.
    #[error("invalid request path: {0}")]
    InvalidPath(#[from] PathError),
}

impl PushError {
    /// Maps the error onto the closed set of outcome classes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TrustStore(_) | Self::Config(_) => ErrorKind::Fatal,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::PartialDelivery { .. } => ErrorKind::PartialDelivery,
            Self::Transport { .. }
            | Self::Protocol(_)
            | Self::Connection(_)
            | Self::Io(_)
            | Self::MalformedBody(_)
            | Self::NoRecipients
            | Self::InvalidPath(_) => ErrorKind::Transport,
        }
    }

    /// Returns `true` for the rate-limit outcome.
    pub fn is_rate_limited(&self) -> bool {
        self.kind() == ErrorKind::RateLimited
    }
}
