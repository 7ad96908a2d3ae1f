//! Snapshot storage.
//!
//! A snapshot is the last accepted value of a snapshot test, stored as
//! indented JSON at `<snapshot_dir>/<name>.snap.json`.

use serde_json::Value;
use std::path::{Path, PathBuf};

/// Error type for snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Failed to write the snapshot file or its parent directory.
    #[error("failed to create/update snapshot {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to encode the value as JSON.
    #[error("failed to encode snapshot data for {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to read the snapshot file.
    #[error("failed to load snapshot {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file is not valid JSON.
    #[error("failed to parse snapshot {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Probing the snapshot file failed for a reason other than absence.
    #[error("failed to stat snapshot {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Storage backend for snapshots.
///
/// Implementations are shared by all workers and must tolerate concurrent
/// calls.
pub trait SnapshotStore: Send + Sync {
    /// Canonical snapshot path for a test name.
    fn path_for(&self, snapshot_dir: &Path, test_name: &str) -> PathBuf {
        snapshot_path(snapshot_dir, test_name)
    }

    /// Load and parse a snapshot.
    fn load(&self, path: &Path) -> Result<Value, SnapshotError>;

    /// Create or overwrite a snapshot, creating parent directories.
    fn create(&self, path: &Path, value: &Value) -> Result<(), SnapshotError>;

    /// Whether the snapshot exists. `Ok(false)` means not found; errors are
    /// reserved for probes that could not be answered.
    fn exists(&self, path: &Path) -> Result<bool, SnapshotError>;
}

/// Lower-cased name with spaces replaced by underscores, plus `.snap.json`.
pub fn snapshot_path(snapshot_dir: &Path, test_name: &str) -> PathBuf {
    let file_name = format!("{}.snap.json", test_name.replace(' ', "_").to_lowercase());
    snapshot_dir.join(file_name)
}

/// Snapshot store on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSnapshotStore;

impl SnapshotStore for FsSnapshotStore {
    fn load(&self, path: &Path) -> Result<Value, SnapshotError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SnapshotError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn create(&self, path: &Path, value: &Value) -> Result<(), SnapshotError> {
        let mut contents =
            serde_json::to_string_pretty(value).map_err(|source| SnapshotError::Encode {
                path: path.to_path_buf(),
                source,
            })?;
        contents.push('\n');

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| SnapshotError::Create {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, contents).map_err(|source| SnapshotError::Create {
            path: path.to_path_buf(),
            source,
        })
    }

    fn exists(&self, path: &Path) -> Result<bool, SnapshotError> {
        match std::fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SnapshotError::Stat {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
