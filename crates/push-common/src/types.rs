//! JSON payloads exchanged with the push service.

use serde::{Deserialize, Serialize};

/// A message submitted to `POST /v1/messages/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Recipient identifiers, in delivery order.
    pub recipients: Vec<String>,
    /// Message text.
    pub body: String,
    /// Ids of previously uploaded attachments, in caller order.
    #[serde(default)]
    pub attachment_ids: Vec<String>,
}

impl OutgoingMessage {
    /// Creates a message with no attachments.
    #[must_use]
    pub fn new(recipients: Vec<String>, body: impl Into<String>) -> Self {
        Self {
            recipients,
            body: body.into(),
            attachment_ids: Vec::new(),
        }
    }

    /// Attaches the given uploaded attachment ids.
    #[must_use]
    pub fn with_attachments(mut self, attachment_ids: Vec<String>) -> Self {
        self.attachment_ids = attachment_ids;
        self
    }
}

/// Body of `PUT /v1/accounts/gcm/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRegistration {
    /// Device push token.
    #[serde(rename = "gcmRegistrationId")]
    pub token: String,
}

/// Server reply to a message submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    /// Recipients the server accepted.
    #[serde(default)]
    pub success: Vec<String>,
    /// Recipients the server could not deliver to.
    #[serde(default)]
    pub failure: Vec<String>,
}

impl SendResponse {
    /// First recipient that failed, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<&str> {
        self.failure.first().map(String::as_str)
    }
}

/// Body returned when an attachment slot is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    /// Opaque attachment id to embed in the outgoing message.
    pub id: String,
}

/// Location and shape of the current directory snapshot.
///
/// The numeric fields are passed through to the directory component
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryDescriptor {
    /// Absolute URL of the gzip-compressed snapshot.
    #[serde(rename = "url", alias = "downloadUrl")]
    pub download_url: String,
    /// Filter capacity.
    pub capacity: u64,
    /// Number of hash functions used by the filter.
    pub hash_count: u32,
    /// Snapshot version.
    pub version: u64,
}
