//! Common types and utilities shared by the push service transport.
//!
//! This crate provides:
//! - JSON wire payloads exchanged with the service ([`types`])
//! - Fixed endpoint templates and positional path rendering ([`path`])
//! - Basic credential encoding ([`auth`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod path;
pub mod types;

pub use path::PathError;
pub use types::{
    AttachmentDescriptor, DirectoryDescriptor, OutgoingMessage, SendResponse, TokenRegistration,
};
