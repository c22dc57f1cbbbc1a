//! Error kinds raised by the sync procedure.

use std::io;
use std::path::PathBuf;

/// Errors from loading/saving the record, touching the trust store, or
/// regenerating the trust bundle.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("CA source directory not found: {}", .0.display())]
    ConfigDirectoryMissing(PathBuf),

    #[error("read installed CA record {}: {source}", .path.display())]
    StorageRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write installed CA record {}: {source}", .path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' failed: {reason}")]
    TrustBundleRegen { command: String, reason: String },

    #[error("failed to remove {} tracked CA file(s): {}", .0.len(), removal_summary(.0))]
    FileRemoval(Vec<(PathBuf, io::Error)>),

    #[error("CA trust store location could not be determined")]
    TrustStoreNotFound,

    #[error("install {}: {source}", .path.display())]
    Install {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("runtime bundle {}: {source}", .path.display())]
    RuntimeBundle {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn removal_summary(failures: &[(PathBuf, io::Error)]) -> String {
    failures
        .iter()
        .map(|(path, e)| format!("{} ({e})", path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}
