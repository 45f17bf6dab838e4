//! Storage for signed and blended bundles.
//!
//! A repository is a flat namespace of named JSON documents. Listing is
//! newest first, so `latest` picks the most recent bundle a producer
//! wrote.
//!
//! - [`FsBundleRepository`]: one directory, ordered by modification time
//!   with ties broken by name (descending). Writes are atomic.
//! - [`MemoryBundleRepository`]: in-memory, ordered by insertion.
//!
//! [`load_latest`] and [`load_latest_audited`] pick a producer's newest
//! signed bundle; the audited form is what a caller must use before
//! blending.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::audit::audit_with_trusted;
use super::types::SignedBundle;
use crate::clock::{Clock, SystemClock};
use crate::crypto::AttestorIdentity;
use crate::determinism::{AtomicWriteError, write_atomic};
use crate::error::InceptionError;

/// Errors from bundle repositories.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RepositoryError {
    /// No entry matched the filter.
    #[error("no bundle files in {location}")]
    NoBundles {
        /// The repository location (directory path for the filesystem).
        location: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An entry could not be decoded as the requested type.
    #[error("cannot decode {name}: {source}")]
    Decode {
        /// The entry name.
        name: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded as JSON.
    #[error("cannot encode bundle: {0}")]
    Encode(#[source] serde_json::Error),

    /// An atomic write failed.
    #[error(transparent)]
    Write(#[from] AtomicWriteError),

    /// The entry name is empty or escapes the repository.
    #[error("invalid bundle name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The named entry does not exist.
    #[error("bundle not found: {name}")]
    NotFound {
        /// The missing entry name.
        name: String,
    },
}

/// Selects entries by file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFilter {
    /// Required name prefix, if any.
    pub prefix: Option<String>,
    /// Required name suffix.
    pub suffix: String,
}

impl Default for BundleFilter {
    fn default() -> Self {
        Self {
            prefix: None,
            suffix: ".json".to_string(),
        }
    }
}

impl BundleFilter {
    /// `.json` entries starting with `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// Returns true if `name` passes the filter.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        name.ends_with(&self.suffix)
            && self
                .prefix
                .as_deref()
                .map_or(true, |prefix| name.starts_with(prefix))
    }
}

/// A listed repository entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// Entry name, relative to the repository.
    pub name: String,
    /// Last modification, milliseconds since the Unix epoch.
    pub modified_ms: u64,
}

/// A flat store of named bundle documents.
pub trait BundleRepository: Send + Sync {
    /// Human-readable location, used in errors and logs.
    fn location(&self) -> String;

    /// Lists entries matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Io`] if the backing store cannot be read.
    fn list(&self, filter: &BundleFilter) -> Result<Vec<BundleEntry>, RepositoryError>;

    /// Returns the newest entry matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NoBundles`] if nothing matches.
    fn latest(&self, filter: &BundleFilter) -> Result<BundleEntry, RepositoryError> {
        self.list(filter)?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NoBundles {
                location: self.location(),
            })
    }

    /// Reads the raw bytes of entry `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] or [`RepositoryError::Io`].
    fn read_bytes(&self, name: &str) -> Result<Vec<u8>, RepositoryError>;

    /// Replaces entry `name` with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the write fails.
    fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), RepositoryError>;

    /// Reads and decodes entry `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Decode`] if the entry is not valid JSON
    /// for `T`.
    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, RepositoryError>
    where
        Self: Sized,
    {
        let bytes = self.read_bytes(name)?;
        serde_json::from_slice(&bytes).map_err(|source| RepositoryError::Decode {
            name: name.to_string(),
            source,
        })
    }

    /// Encodes `value` as pretty JSON and writes it to entry `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Encode`] or a write error.
    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), RepositoryError>
    where
        Self: Sized,
    {
        let mut bytes = serde_json::to_vec_pretty(value).map_err(RepositoryError::Encode)?;
        bytes.push(b'\n');
        self.write_bytes(name, &bytes)
    }
}

/// Returns `<prefix>-<millis>-<8 hex digits>`.
///
/// The random suffix keeps names minted within the same millisecond
/// distinct.
#[must_use]
pub fn timestamped_name(prefix: &str, millis: u64) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{millis}-{}", &suffix[..8])
}

/// A signed bundle together with the entry name it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestBundle {
    /// Entry name within the repository.
    pub name: String,
    /// The decoded bundle.
    pub signed: SignedBundle,
}

/// Reads the newest entry matching `filter` as a signed bundle.
///
/// # Errors
///
/// Returns [`RepositoryError::NoBundles`] if nothing matches, or a read or
/// decode error for the chosen entry.
pub fn load_latest<R: BundleRepository>(
    repo: &R,
    filter: &BundleFilter,
) -> Result<LatestBundle, RepositoryError> {
    let entry = repo.latest(filter)?;
    let signed = repo.read_json(&entry.name)?;
    Ok(LatestBundle {
        name: entry.name,
        signed,
    })
}

/// Reads the newest signed bundle and audits it against `trusted`.
///
/// # Errors
///
/// Returns [`InceptionError::Repository`] if no bundle can be read and
/// [`InceptionError::Audit`] if the bundle fails its audit.
pub fn load_latest_audited<R: BundleRepository>(
    repo: &R,
    filter: &BundleFilter,
    trusted: &[AttestorIdentity],
) -> Result<LatestBundle, InceptionError> {
    let latest = load_latest(repo, filter)?;
    let identity = audit_with_trusted(&latest.signed, trusted)?;
    debug!(
        location = %repo.location(),
        name = %latest.name,
        signer = %identity.id(),
        "latest bundle passed audit"
    );
    Ok(latest)
}

fn validate_name(name: &str) -> Result<(), RepositoryError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(RepositoryError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Repository over a single directory.
#[derive(Debug, Clone)]
pub struct FsBundleRepository {
    dir: PathBuf,
}

impl FsBundleRepository {
    /// Opens a repository rooted at `dir`. The directory is created on the
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The backing directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of entry `name`.
    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn io_error(path: &Path, source: std::io::Error) -> RepositoryError {
        RepositoryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl BundleRepository for FsBundleRepository {
    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn list(&self, filter: &BundleFilter) -> Result<Vec<BundleEntry>, RepositoryError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            // A producer that has not run yet leaves no directory.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&self.dir, e)),
        };

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(|e| Self::io_error(&self.dir, e))?;
            let Ok(name) = dir_entry.file_name().into_string() else {
                continue;
            };
            if !filter.matches(&name) {
                continue;
            }
            let metadata = dir_entry
                .metadata()
                .map_err(|e| Self::io_error(&dir_entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }
            let modified_ms = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
            entries.push(BundleEntry { name, modified_ms });
        }

        entries.sort_by(|a, b| {
            b.modified_ms
                .cmp(&a.modified_ms)
                .then_with(|| b.name.cmp(&a.name))
        });
        debug!(dir = %self.dir.display(), count = entries.len(), "listed bundles");
        Ok(entries)
    }

    fn read_bytes(&self, name: &str) -> Result<Vec<u8>, RepositoryError> {
        validate_name(name)?;
        let path = self.path_of(name);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RepositoryError::NotFound {
                    name: name.to_string(),
                }
            } else {
                Self::io_error(&path, e)
            }
        })
    }

    fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), RepositoryError> {
        validate_name(name)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;
        let path = self.path_of(name);
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote bundle");
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryEntry {
    name: String,
    modified_ms: u64,
    bytes: Vec<u8>,
}

/// In-memory repository for tests.
///
/// Entries are listed in reverse insertion order; rewriting an entry moves
/// it to the front.
#[derive(Debug)]
pub struct MemoryBundleRepository {
    label: String,
    entries: RwLock<Vec<MemoryEntry>>,
}

impl Default for MemoryBundleRepository {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryBundleRepository {
    /// Creates an empty repository reporting `label` as its location.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns true if nothing has been written.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }
}

impl BundleRepository for MemoryBundleRepository {
    fn location(&self) -> String {
        self.label.clone()
    }

    fn list(&self, filter: &BundleFilter) -> Result<Vec<BundleEntry>, RepositoryError> {
        let entries = self.entries.read().expect("lock poisoned");
        Ok(entries
            .iter()
            .rev()
            .filter(|e| filter.matches(&e.name))
            .map(|e| BundleEntry {
                name: e.name.clone(),
                modified_ms: e.modified_ms,
            })
            .collect())
    }

    fn read_bytes(&self, name: &str) -> Result<Vec<u8>, RepositoryError> {
        validate_name(name)?;
        let entries = self.entries.read().expect("lock poisoned");
        entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.bytes.clone())
            .ok_or_else(|| RepositoryError::NotFound {
                name: name.to_string(),
            })
    }

    fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), RepositoryError> {
        validate_name(name)?;
        let mut entries = self.entries.write().expect("lock poisoned");
        entries.retain(|e| e.name != name);
        entries.push(MemoryEntry {
            name: name.to_string(),
            modified_ms: SystemClock.now_millis(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}
