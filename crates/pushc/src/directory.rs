//! Hand-off point to the contact directory.
//!
//! The directory itself (a Bloom filter over registered numbers) lives
//! outside this crate. The transport downloads a snapshot and passes the
//! local file plus the descriptor's parameters to a [`DirectoryStore`].

use push_common::DirectoryDescriptor;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Consumer of downloaded directory snapshots.
pub trait DirectoryStore {
    /// Replaces the current directory with the snapshot at `snapshot`.
    ///
    /// # Errors
    ///
    /// Implementations return an error if the snapshot cannot be adopted.
    fn update(
        &self,
        snapshot: &Path,
        capacity: u64,
        hash_count: u32,
        version: u64,
    ) -> anyhow::Result<()>;
}

/// Outcome of a successful directory retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUpdate {
    /// Local file holding the decompressed snapshot.
    pub snapshot: PathBuf,
    /// Descriptor the snapshot was fetched with.
    pub descriptor: DirectoryDescriptor,
}

/// Metadata recorded for the latest adopted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Snapshot file.
    pub snapshot: PathBuf,
    /// Filter capacity.
    pub capacity: u64,
    /// Number of hash functions.
    pub hash_count: u32,
    /// Snapshot version.
    pub version: u64,
}

/// A [`DirectoryStore`] that records the latest snapshot in a TOML manifest
/// and removes the snapshot it replaces.
///
/// The manifest is replaced atomically by renaming a staged file over it.
pub struct ManifestDirectory {
    path: PathBuf,
    current: RwLock<Option<SnapshotManifest>>,
}

impl ManifestDirectory {
    /// Opens the manifest at `path`, reading any existing entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read or parsed.
    pub fn load(path: PathBuf) -> anyhow::Result<Self> {
        let current = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Some(toml::from_str::<SnapshotManifest>(&contents)?)
        } else {
            None
        };
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    /// The latest adopted snapshot, if any.
    pub fn current(&self) -> Option<SnapshotManifest> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persist(&self, manifest: &SnapshotManifest) -> anyhow::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut staged = tempfile::Builder::new()
            .prefix(".directory")
            .suffix(".toml")
            .tempfile_in(dir)?;
        staged.write_all(toml::to_string_pretty(manifest)?.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl DirectoryStore for ManifestDirectory {
    fn update(
        &self,
        snapshot: &Path,
        capacity: u64,
        hash_count: u32,
        version: u64,
    ) -> anyhow::Result<()> {
        if !snapshot.is_file() {
            anyhow::bail!("snapshot {} does not exist", snapshot.display());
        }

        let manifest = SnapshotManifest {
            snapshot: snapshot.to_path_buf(),
            capacity,
            hash_count,
            version,
        };

        // Held across the file swap: disk and `current` must name the same snapshot.
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&manifest)?;
        if let Some(previous) = guard.replace(manifest) {
            if previous.snapshot != snapshot {
                let _ = std::fs::remove_file(&previous.snapshot);
            }
        }
        Ok(())
    }
}
