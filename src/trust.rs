//! Trust directory file operations: tracked removal and unique-name copies.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::error::SyncError;
use crate::store::InstalledRecord;

/// Hex digits of the content hash kept in an installed filename.
pub const UNIQUE_PREFIX_LEN: usize = 16;

/// Remove one installed CA file from the trust directory.
pub fn remove_one(trust_dir: &Path, filename: &str) -> std::io::Result<()> {
    fs::remove_file(trust_dir.join(filename))
}

/// Remove every trust-directory file named by a record value.
///
/// Files not in the record are never touched. Every tracked file is attempted;
/// if any deletion failed the collected failures are returned together.
pub fn remove_all_tracked(trust_dir: &Path, record: &InstalledRecord) -> Result<usize, SyncError> {
    if record.is_empty() {
        return Ok(0);
    }
    let entries = fs::read_dir(trust_dir).map_err(|e| {
        SyncError::FileRemoval(vec![(trust_dir.to_path_buf(), e)])
    })?;

    let mut removed = 0;
    let mut failures = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                failures.push((trust_dir.to_path_buf(), e));
                continue;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !record.contains_filename(name) {
            continue;
        }
        match remove_one(trust_dir, name) {
            Ok(()) => {
                log::debug!("removed {}", entry.path().display());
                removed += 1;
            }
            Err(e) => {
                log::warn!("Failed to delete {} Reason: {e}", entry.path().display());
                failures.push((entry.path(), e));
            }
        }
    }

    if failures.is_empty() {
        Ok(removed)
    } else {
        Err(SyncError::FileRemoval(failures))
    }
}

/// `<hash prefix>_<basename>`, hash = SHA-256 over id, a NUL separator, and content.
///
/// The prefix is lowercase hex (`0-9a-f`), not a decimal-digit string. It is
/// stable for unchanged content and differs between ids sharing one file.
pub fn unique_name(id: &str, content: &[u8], basename: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update([0u8]);
    hasher.update(content);
    let digest = hex::encode(hasher.finalize());
    format!("{}_{basename}", &digest[..UNIQUE_PREFIX_LEN])
}

/// Write `content`, read from `source`, into `trust_dir` under a unique name; returns that name.
pub fn copy_with_unique_name(
    trust_dir: &Path,
    id: &str,
    source: &Path,
    content: &[u8],
) -> Result<String, SyncError> {
    let basename = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.to_string());
    let name = unique_name(id, content, &basename);
    let dest = trust_dir.join(&name);

    log::debug!("copying cert from {} to {}", source.display(), dest.display());
    fs::write(&dest, content).map_err(|e| SyncError::Install {
        path: dest.clone(),
        source: e,
    })?;
    Ok(name)
}
