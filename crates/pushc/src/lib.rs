//! Push service transport client.
//!
//! Sends certificate-pinned HTTPS requests to the push service, moves
//! attachments through server-issued storage URLs and downloads directory
//! snapshots.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Attachment slot allocation, upload, and snapshot download.
pub mod attachment;
/// CLI parsing and TOML configuration.
pub mod config;
/// Hand-off of downloaded snapshots to the contact directory.
pub mod directory;
/// Error types and outcome classification.
pub mod error;
/// Request sending and status classification.
pub mod executor;
/// Authenticated request construction.
pub mod request;
/// Public push service operations.
pub mod service;
/// Sealed trust store loading for certificate pinning.
pub mod trust;

pub use error::{ErrorKind, PushError};
pub use service::{PushServiceClient, SendReceipt};
