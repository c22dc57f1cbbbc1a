//! Installed CA record and its durable store.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Logical id -> unique filename this system installed in the trust directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstalledRecord(BTreeMap<String, String>);

impl InstalledRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, filename: impl Into<String>) {
        self.0.insert(id.into(), filename.into());
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn contains_filename(&self, filename: &str) -> bool {
        self.0.values().any(|v| v == filename)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InstalledRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Load/save access to the persisted record.
pub trait RecordStore {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<InstalledRecord>, SyncError>;
    fn save(&self, record: &InstalledRecord) -> Result<(), SyncError>;
}

/// Record kept as a JSON document; saves go through a temp file and rename.
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    path: PathBuf,
}

impl JsonRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_err(&self, source: io::Error) -> SyncError {
        SyncError::StorageRead {
            path: self.path.clone(),
            source,
        }
    }

    fn write_err(&self, source: io::Error) -> SyncError {
        SyncError::StorageWrite {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordStore for JsonRecordStore {
    fn load(&self) -> Result<Option<InstalledRecord>, SyncError> {
        let s = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.read_err(e)),
        };
        let record = serde_json::from_str(&s)
            .map_err(|e| self.read_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        Ok(Some(record))
    }

    fn save(&self, record: &InstalledRecord) -> Result<(), SyncError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.write_err(e))?;

        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| self.write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.write_err(e))?;
        temp.write_all(&bytes).map_err(|e| self.write_err(e))?;
        temp.as_file().sync_all().map_err(|e| self.write_err(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.write_err(e.error))?;
        Ok(())
    }
}
