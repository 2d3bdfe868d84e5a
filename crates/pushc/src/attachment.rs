//! Attachment upload and bulk snapshot download.
//!
//! Upload is a two-step exchange. [`allocate`] asks the service for a slot
//! and yields an [`AttachmentSlot`]; the only way to turn a slot into an
//! [`AttachmentReference`] is [`AttachmentSlot::upload`], which consumes it.
//! A reference therefore always names bytes that reached storage.

use crate::error::PushError;
use crate::executor::Executor;
use crate::request::{PushRequest, RequestBody, RequestBuilder};
use flate2::read::GzDecoder;
use push_common::path::ATTACHMENT_PATH;
use push_common::AttachmentDescriptor;
use reqwest::{Method, Url};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Response header carrying the pre-signed upload URL.
pub const CONTENT_LOCATION: &str = "Content-Location";

/// Copy buffer size for snapshot downloads.
const DOWNLOAD_BUFFER_SIZE: usize = 4096;

/// Raw bytes of one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    /// Attachment contents.
    pub data: Vec<u8>,
}

impl AttachmentPayload {
    /// Wraps `data`.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

/// Id of an attachment whose bytes have been stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentReference {
    /// Opaque id to embed in an outgoing message.
    pub id: String,
}

/// An allocated but not yet filled upload slot.
#[derive(Debug)]
#[must_use = "a slot is useless until its bytes are uploaded"]
pub struct AttachmentSlot {
    id: String,
    location: Url,
}

impl AttachmentSlot {
    /// Id the service assigned to this slot.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pre-signed destination URL.
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// PUTs `data` to the slot's location without credentials.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Transport`] if storage answers with anything but
    /// 200, or [`PushError::Connection`] if the upload cannot complete.
    pub fn upload(
        self,
        executor: &Executor,
        data: &[u8],
    ) -> Result<AttachmentReference, PushError> {
        let request = PushRequest::external(
            Method::PUT,
            self.location.as_str(),
            Some(RequestBody::Binary(data.to_vec())),
        )?;
        executor.execute(request, None)?;
        debug!(id = %self.id, len = data.len(), "attachment uploaded");
        Ok(AttachmentReference { id: self.id })
    }
}

/// Asks the service for a new upload slot.
///
/// # Errors
///
/// Returns [`PushError::Protocol`] if the response has no usable
/// `Content-Location`, [`PushError::MalformedBody`] if the body lacks an id,
/// and propagates rate-limit and transport failures unchanged.
pub fn allocate(builder: &RequestBuilder, executor: &Executor) -> Result<AttachmentSlot, PushError> {
    let request = builder.build(ATTACHMENT_PATH, &[""], Method::GET, None)?;
    let response = executor.execute(request, Some(CONTENT_LOCATION))?;

    let location = response.header.as_deref().ok_or_else(|| {
        PushError::Protocol("server failed to allocate an attachment key".to_string())
    })?;
    debug!(location, "got attachment content location");

    let location = Url::parse(location).map_err(|e| {
        PushError::Protocol(format!("unusable attachment location {location:?}: {e}"))
    })?;
    let descriptor: AttachmentDescriptor = response.json()?;

    Ok(AttachmentSlot {
        id: descriptor.id,
        location,
    })
}

/// Allocates and uploads each attachment in order, one at a time.
///
/// Stops at the first failure; references already obtained are dropped with
/// the error.
///
/// # Errors
///
/// Returns the first allocation or upload error.
pub fn upload_all(
    builder: &RequestBuilder,
    executor: &Executor,
    attachments: &[AttachmentPayload],
) -> Result<Vec<AttachmentReference>, PushError> {
    let mut references = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let slot = allocate(builder, executor)?;
        references.push(slot.upload(executor, &attachment.data)?);
    }
    Ok(references)
}

/// Downloads a gzip-compressed resource from `url` and writes the
/// decompressed bytes to a new `directory*.dat` file in `dest_dir`.
///
/// The payload is streamed through a fixed-size buffer. The returned file is
/// flushed and closed. On any error the partial file is removed.
///
/// # Errors
///
/// Returns [`PushError::Transport`] on a non-200 status, [`PushError::Io`]
/// if the stream is not valid gzip or the file cannot be written.
pub fn download_snapshot(
    executor: &Executor,
    url: &str,
    dest_dir: &Path,
) -> Result<PathBuf, PushError> {
    let request = PushRequest::external(Method::GET, url, None)?;
    let response = executor.open(request)?;

    std::fs::create_dir_all(dest_dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("directory")
        .suffix(".dat")
        .tempfile_in(dest_dir)?;

    let mut decoder = GzDecoder::new(response);
    let mut buffer = [0u8; DOWNLOAD_BUFFER_SIZE];
    let mut total: u64 = 0;
    loop {
        let read = decoder.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])?;
        total += read as u64;
    }
    file.flush()?;
    file.as_file().sync_all()?;

    let (handle, path) = file.keep().map_err(|e| PushError::Io(e.error))?;
    drop(handle);

    info!(path = %path.display(), bytes = total, "snapshot downloaded");
    Ok(path)
}
