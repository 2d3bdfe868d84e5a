//! Push service operations.
//!
//! Every operation is one or more blocking round trips on the calling
//! thread. Nothing is retried or queued; the first failure is returned
//! unchanged.

use crate::attachment::{self, AttachmentPayload};
use crate::config::{ClientConfig, TransportConfig};
use crate::directory::{DirectoryStore, DirectoryUpdate};
use crate::error::PushError;
use crate::executor::{Executor, Response};
use crate::request::{ClientIdentity, RequestBody, RequestBuilder};
use crate::trust::PinnedTrustContext;
use push_common::path::{
    CREATE_ACCOUNT_SMS_PATH, CREATE_ACCOUNT_VOICE_PATH, DIRECTORY_PATH, MESSAGE_PATH,
    REGISTER_TOKEN_PATH, VERIFY_ACCOUNT_PATH,
};
use push_common::{DirectoryDescriptor, OutgoingMessage, SendResponse, TokenRegistration};
use reqwest::Method;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Recipients the service accepted a message for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Accepted recipients as reported by the service.
    pub accepted: Vec<String>,
}

/// Client for the push service.
///
/// Holds only immutable state, so one instance can serve any number of
/// sequential or concurrent calls.
#[derive(Debug, Clone)]
pub struct PushServiceClient {
    requests: RequestBuilder,
    executor: Executor,
}

impl PushServiceClient {
    /// Creates a client from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Config`] if the service URL is unusable or
    /// pinning is enforced without `trust`.
    pub fn new(
        config: &TransportConfig,
        identity: ClientIdentity,
        trust: Option<PinnedTrustContext>,
    ) -> Result<Self, PushError> {
        if identity.principal().is_empty() {
            return Err(PushError::Config("account number must not be empty".to_string()));
        }
        let requests = RequestBuilder::new(&config.service_url, Arc::new(identity))?;
        let executor = Executor::new(config, trust.as_ref())?;
        Ok(Self { requests, executor })
    }

    /// Creates a client from loaded configuration, opening the trust store
    /// when pinning is enforced.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Config`] for invalid settings and
    /// [`PushError::TrustStore`] if the trust store does not open.
    pub fn from_config(config: &ClientConfig) -> Result<Self, PushError> {
        config.validate().map_err(PushError::Config)?;

        let trust = if config.enforce_tls_pinning {
            let path = config.trust_store.as_deref().ok_or_else(|| {
                PushError::Config("trust_store must be set when pinning is enforced".to_string())
            })?;
            Some(PinnedTrustContext::load_file(
                path,
                &config.trust_store_passphrase,
            )?)
        } else {
            warn!("TLS pinning disabled; service certificates are checked against system roots");
            None
        };

        let identity = ClientIdentity::new(
            config.account.number.clone(),
            config.account.password.clone(),
        );
        Self::new(&config.transport(), identity, trust)
    }

    /// The identity requests are sent as.
    pub fn identity(&self) -> &ClientIdentity {
        self.requests.identity()
    }

    /// Requests a verification code by SMS, or by voice call when `voice`.
    ///
    /// # Errors
    ///
    /// Propagates rate-limit and transport failures.
    pub fn create_account(&self, voice: bool) -> Result<(), PushError> {
        let template = if voice {
            CREATE_ACCOUNT_VOICE_PATH
        } else {
            CREATE_ACCOUNT_SMS_PATH
        };
        self.call(template, &[self.identity().principal()], Method::POST, None)?;
        Ok(())
    }

    /// Confirms the account with the code the user received.
    ///
    /// # Errors
    ///
    /// Propagates rate-limit and transport failures.
    pub fn verify_account(&self, code: &str) -> Result<(), PushError> {
        self.call(VERIFY_ACCOUNT_PATH, &[code], Method::PUT, None)?;
        Ok(())
    }

    /// Registers the device push token.
    ///
    /// # Errors
    ///
    /// Propagates rate-limit and transport failures.
    pub fn register_token(&self, token: &str) -> Result<(), PushError> {
        let body = RequestBody::json(&TokenRegistration {
            token: token.to_string(),
        })?;
        self.call(REGISTER_TOKEN_PATH, &[], Method::PUT, Some(body))?;
        Ok(())
    }

    /// Removes the registered push token.
    ///
    /// # Errors
    ///
    /// Propagates rate-limit and transport failures.
    pub fn unregister_token(&self) -> Result<(), PushError> {
        self.call(REGISTER_TOKEN_PATH, &[], Method::DELETE, None)?;
        Ok(())
    }

    /// Sends `text` to a single recipient.
    ///
    /// # Errors
    ///
    /// See [`send_message`](Self::send_message).
    pub fn send_to(&self, recipient: &str, text: &str) -> Result<SendReceipt, PushError> {
        self.send_message(&[recipient.to_string()], text, &[])
    }

    /// Uploads `attachments` in order, then sends `text` to `recipients`
    /// referencing them.
    ///
    /// No message is sent if any upload fails.
    ///
    /// # Errors
    ///
    /// Returns the first upload or send failure, or
    /// [`PushError::PartialDelivery`] naming the first recipient the service
    /// could not reach.
    pub fn send_message(
        &self,
        recipients: &[String],
        text: &str,
        attachments: &[AttachmentPayload],
    ) -> Result<SendReceipt, PushError> {
        if recipients.is_empty() {
            return Err(PushError::NoRecipients);
        }

        let attachment_ids = attachment::upload_all(&self.requests, &self.executor, attachments)?
            .into_iter()
            .map(|reference| reference.id)
            .collect();

        let message = OutgoingMessage::new(recipients.to_vec(), text).with_attachments(attachment_ids);
        let response: SendResponse = self
            .call(MESSAGE_PATH, &[], Method::POST, Some(RequestBody::json(&message)?))?
            .json()?;

        if let Some(recipient) = response.first_failure() {
            warn!(recipient, failed = response.failure.len(), "send failure");
            return Err(PushError::PartialDelivery {
                recipient: recipient.to_string(),
                failed: response.failure.clone(),
            });
        }

        Ok(SendReceipt {
            accepted: response.success,
        })
    }

    /// Fetches the directory descriptor, downloads the snapshot into
    /// `data_dir`, and hands it to `store`.
    ///
    /// Directory sync is advisory: any failure is logged and reported as
    /// `None`, never as an error.
    pub fn retrieve_directory(
        &self,
        store: &dyn DirectoryStore,
        data_dir: &Path,
    ) -> Option<DirectoryUpdate> {
        match self.sync_directory(store, data_dir) {
            Ok(update) => {
                info!(
                    version = update.descriptor.version,
                    path = %update.snapshot.display(),
                    "directory updated"
                );
                Some(update)
            }
            Err(e) => {
                warn!(error = %e, "directory retrieval failed");
                None
            }
        }
    }

    fn sync_directory(
        &self,
        store: &dyn DirectoryStore,
        data_dir: &Path,
    ) -> anyhow::Result<DirectoryUpdate> {
        let descriptor: DirectoryDescriptor =
            self.call(DIRECTORY_PATH, &[], Method::GET, None)?.json()?;
        let snapshot =
            attachment::download_snapshot(&self.executor, &descriptor.download_url, data_dir)?;

        if let Err(e) = store.update(
            &snapshot,
            descriptor.capacity,
            descriptor.hash_count,
            descriptor.version,
        ) {
            let _ = std::fs::remove_file(&snapshot);
            return Err(e);
        }

        Ok(DirectoryUpdate {
            snapshot,
            descriptor,
        })
    }

    fn call(
        &self,
        template: &str,
        args: &[&str],
        method: Method,
        body: Option<RequestBody>,
    ) -> Result<Response, PushError> {
        let request = self.requests.build(template, args, method, body)?;
        self.executor.execute(request, None)
    }
}
