//! Sealed trust-anchor store for certificate pinning.
//!
//! The store is a PEM bundle of the service's trust anchors sealed with
//! ChaCha20-Poly1305 under a key derived from a build-time passphrase:
//!
//! ```text
//! "PTS1" | salt (16) | nonce (12) | ciphertext || tag
//! key = HKDF-SHA256(ikm = passphrase, salt, info = "pushc trust store v1")
//! ```
//!
//! Loading happens once per client. Any failure is fatal: a store that does
//! not open means a corrupted build artifact, and the client must not fall
//! back to system trust.

use crate::error::PushError;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use rustls::RootCertStore;
use sha2::Sha256;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const MAGIC: &[u8; 4] = b"PTS1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = MAGIC.len() + SALT_LEN + NONCE_LEN;
const KDF_INFO: &[u8] = b"pushc trust store v1";

/// Verification context built from the sealed trust store.
///
/// Immutable once built. Cloning shares the same underlying TLS
/// configuration.
#[derive(Clone)]
pub struct PinnedTrustContext {
    tls: Arc<rustls::ClientConfig>,
    anchors: usize,
}

impl std::fmt::Debug for PinnedTrustContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedTrustContext")
            .field("anchors", &self.anchors)
            .finish_non_exhaustive()
    }
}

impl PinnedTrustContext {
    /// Opens a sealed store and builds a TLS configuration that trusts only
    /// the anchors it contains.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::TrustStore`] if the store is truncated, has the
    /// wrong format, fails authentication (wrong passphrase or tampering),
    /// holds no certificates, or holds a certificate rustls rejects.
    pub fn load(sealed: &[u8], passphrase: &str) -> Result<Self, PushError> {
        let pem = open(sealed, passphrase)?;

        let certs = rustls_pemfile::certs(&mut pem.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PushError::TrustStore(format!("unreadable PEM bundle: {e}")))?;
        if certs.is_empty() {
            return Err(PushError::TrustStore(
                "trust store contains no certificates".to_string(),
            ));
        }

        let mut roots = RootCertStore::empty();
        for cert in certs {
            roots
                .add(cert)
                .map_err(|e| PushError::TrustStore(format!("rejected trust anchor: {e}")))?;
        }
        let anchors = roots.len();

        let tls = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| PushError::TrustStore(format!("TLS initialisation failed: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        debug!(anchors, "loaded pinned trust store");
        Ok(Self {
            tls: Arc::new(tls),
            anchors,
        })
    }

    /// Reads and opens a sealed store from disk.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::TrustStore`] if the file cannot be read or does
    /// not open.
    pub fn load_file(path: &Path, passphrase: &str) -> Result<Self, PushError> {
        let sealed = std::fs::read(path).map_err(|e| {
            PushError::TrustStore(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::load(&sealed, passphrase)
    }

    /// Number of trust anchors in the store.
    pub fn anchor_count(&self) -> usize {
        self.anchors
    }

    /// TLS configuration to hand to the HTTP client.
    pub(crate) fn tls_config(&self) -> rustls::ClientConfig {
        (*self.tls).clone()
    }
}

/// Seals a PEM bundle into the store format read by
/// [`PinnedTrustContext::load`].
///
/// # Errors
///
/// Returns [`PushError::TrustStore`] if key derivation or encryption fails.
pub fn seal(pem: &[u8], passphrase: &str) -> Result<Vec<u8>, PushError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let cipher = cipher_for(passphrase, &salt)?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: pem,
                aad: MAGIC,
            },
        )
        .map_err(|_| PushError::TrustStore("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open(sealed: &[u8], passphrase: &str) -> Result<Vec<u8>, PushError> {
    if sealed.len() <= HEADER_LEN {
        return Err(PushError::TrustStore(format!(
            "trust store too short: {} bytes",
            sealed.len()
        )));
    }
    let (magic, rest) = sealed.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(PushError::TrustStore("unrecognised trust store format".to_string()));
    }
    let (salt, rest) = rest.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let cipher = cipher_for(passphrase, salt)?;
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: MAGIC,
            },
        )
        .map_err(|_| {
            PushError::TrustStore("trust store failed to decrypt (wrong passphrase?)".to_string())
        })
}

fn cipher_for(passphrase: &str, salt: &[u8]) -> Result<ChaCha20Poly1305, PushError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), passphrase.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(KDF_INFO, &mut key)
        .map_err(|_| PushError::TrustStore("key derivation failed".to_string()))?;
    Ok(ChaCha20Poly1305::new(Key::from_slice(&key)))
}
