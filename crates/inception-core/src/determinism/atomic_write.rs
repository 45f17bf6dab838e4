//! Crash-safe file writes.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from [`write_atomic`].
#[derive(Debug, Error)]
pub enum AtomicWriteError {
    /// The target path has no parent directory to stage the temp file in.
    #[error("target has no parent directory: {}", path.display())]
    NoParent {
        /// The rejected target path.
        path: PathBuf,
    },

    /// Creating, writing or syncing the temp file failed.
    #[error("cannot stage temp file in {}: {source}", dir.display())]
    Stage {
        /// The staging directory.
        dir: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Renaming the temp file over the target failed.
    #[error("cannot persist temp file to {}: {source}", path.display())]
    Persist {
        /// The destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Writes `bytes` to `path` via `NamedTempFile` in the same directory,
/// fsync, then rename.
///
/// The temp file is created with a random name and `O_EXCL`; it is removed
/// on every early-return path when the handle drops.
///
/// # Errors
///
/// Returns [`AtomicWriteError`] if the temp file cannot be staged or
/// persisted.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AtomicWriteError> {
    let dir = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => {
            return Err(AtomicWriteError::NoParent {
                path: path.to_path_buf(),
            });
        },
    };

    let stage = |source| AtomicWriteError::Stage {
        dir: dir.to_path_buf(),
        source,
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(stage)?;
    temp.as_file_mut().write_all(bytes).map_err(stage)?;
    temp.as_file().sync_all().map_err(stage)?;

    temp.persist(path)
        .map_err(|e| AtomicWriteError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bundle.json");

        write_atomic(&target, b"{\"v\":1}").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{\"v\":1}");

        write_atomic(&target, b"{\"v\":2}").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{\"v\":2}");

        // No staging files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_directory_is_stage_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("absent").join("bundle.json");

        let err = write_atomic(&target, b"{}").unwrap_err();
        assert!(matches!(err, AtomicWriteError::Stage { .. }));
    }
}
