//! Runtime certificate bundle: locate, append marked blocks, prune them.
//!
//! Every certificate this system appends is wrapped in `# ca-sync begin <id>`
//! and `# ca-sync end <id>` comment lines. PEM readers ignore them, and they
//! let a later run strip exactly what was added.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::SyncError;

const BEGIN_PREFIX: &str = "# ca-sync begin ";
const END_PREFIX: &str = "# ca-sync end ";

/// Env vars consulted, in order, when no bundle path is configured.
pub const BUNDLE_ENV_VARS: &[&str] = &["SSL_CERT_FILE", "REQUESTS_CA_BUNDLE"];

/// Resolve the runtime bundle: configured path first, then the env vars.
pub fn locate(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = configured {
        return Some(p.to_path_buf());
    }
    BUNDLE_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .find(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn bundle_err(path: &Path) -> impl Fn(io::Error) -> SyncError + '_ {
    move |source| SyncError::RuntimeBundle {
        path: path.to_path_buf(),
        source,
    }
}

/// Whether `id` fits on a marker line: non-empty, no control characters.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(char::is_control)
}

/// Append `content` verbatim as a marked block, preceded by a newline.
pub fn append_block(path: &Path, id: &str, content: &[u8]) -> Result<(), SyncError> {
    if !is_valid_id(id) {
        return Err(bundle_err(path)(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("id {id:?} cannot be used as a bundle marker"),
        )));
    }
    let mut block = Vec::with_capacity(content.len() + 64);
    block.push(b'\n');
    block.extend_from_slice(format!("{BEGIN_PREFIX}{id}\n").as_bytes());
    block.extend_from_slice(content);
    if !content.ends_with(b"\n") {
        block.push(b'\n');
    }
    block.extend_from_slice(format!("{END_PREFIX}{id}\n").as_bytes());

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(bundle_err(path))?;
    file.write_all(&block).map_err(bundle_err(path))?;
    Ok(())
}

/// Strip marked blocks; all of them, or only `id`'s. Returns blocks removed.
///
/// A missing bundle file has nothing to prune.
pub fn prune(path: &Path, id: Option<&str>) -> Result<usize, SyncError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(bundle_err(path)(e)),
    };

    let mut out: Vec<&[u8]> = Vec::new();
    let mut removed = 0;
    let mut end_marker: Option<Vec<u8>> = None;
    for line in bytes.split_inclusive(|b| *b == b'\n') {
        let bare = trim_eol(line);
        if let Some(end) = &end_marker {
            if bare == end.as_slice() {
                end_marker = None;
            }
            continue;
        }
        if let Some(block_id) = bare.strip_prefix(BEGIN_PREFIX.as_bytes()) {
            if id.map_or(true, |want| want.as_bytes() == block_id) {
                // Drop the separator newline written ahead of the block.
                if out.last().is_some_and(|l| trim_eol(l).is_empty()) {
                    out.pop();
                }
                end_marker = Some([END_PREFIX.as_bytes(), block_id].concat());
                removed += 1;
                continue;
            }
        }
        out.push(line);
    }

    if removed > 0 {
        replace_contents(path, &out.concat())?;
        log::debug!("pruned {removed} block(s) from {}", path.display());
    }
    Ok(removed)
}

/// Swap in new contents through a temp file in the same directory, keeping
/// the file's permissions. A symlinked bundle has its target replaced.
fn replace_contents(path: &Path, contents: &[u8]) -> Result<(), SyncError> {
    let err = bundle_err(path);
    let target = fs::canonicalize(path).map_err(&err)?;
    let permissions = fs::metadata(&target).map_err(&err)?.permissions();
    let dir = target.parent().unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(&err)?;
    temp.write_all(contents).map_err(&err)?;
    temp.as_file().set_permissions(permissions).map_err(&err)?;
    temp.as_file().sync_all().map_err(&err)?;
    temp.persist(&target).map_err(|e| err(e.error))?;
    Ok(())
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
