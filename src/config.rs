//! Configuration loading and path resolution.
//!
//! Supports CA_SYNC_HOME env var override for testing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectory of the base dir holding the source CA files.
pub const CA_SOURCE_SUBDIR: &str = "additional_ca";

/// Paths for the ca-sync data store.
#[derive(Debug, Clone)]
pub struct SyncPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub source_dir: PathBuf,
    pub record_file: PathBuf,
}

impl SyncPaths {
    /// Build paths from base directory (e.g. ProjectDirs config dir or CA_SYNC_HOME).
    pub fn from_base(base: PathBuf) -> Self {
        let config_file = base.join("config.toml");
        let source_dir = base.join(CA_SOURCE_SUBDIR);
        let record_file = base.join(".storage").join("additional_ca.json");
        Self {
            config_dir: base,
            config_file,
            source_dir,
            record_file,
        }
    }

    /// Paths for testing: use a temp dir as base.
    pub fn for_test(base: impl AsRef<Path>) -> Self {
        Self::from_base(base.as_ref().to_path_buf())
    }

    /// Get default paths (respects CA_SYNC_HOME).
    pub fn default_paths() -> Self {
        let base = if let Ok(home) = std::env::var("CA_SYNC_HOME") {
            PathBuf::from(home)
        } else if let Some(dirs) = directories::ProjectDirs::from("org", "ca-sync", "ca-sync") {
            dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from(".ca-sync")
        };
        Self::from_base(base)
    }
}

/// One configured CA: logical id -> path relative to the source dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaEntry {
    pub id: String,
    pub path: String,
}

/// Optional trust store override; detected when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustStoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Program followed by its arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// Main config.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_bundle: Option<PathBuf>,
    #[serde(default)]
    pub trust_store: TrustStoreConfig,
    #[serde(default, with = "ordered_entries")]
    pub certificates: Vec<CaEntry>,
}

/// Path to config.toml (respects CA_SYNC_HOME).
pub fn config_path() -> PathBuf {
    SyncPaths::default_paths().config_file
}

impl Config {
    /// Load config from paths (with shared lock when file exists).
    pub fn load(paths: &SyncPaths) -> Result<Config> {
        if paths.config_file.is_file() {
            let mut file = fs::OpenOptions::new().read(true).open(&paths.config_file)?;
            fs2::FileExt::lock_shared(&file)?;
            use std::io::Read;
            let mut s = String::new();
            file.read_to_string(&mut s)?;
            let cfg: Config = toml::from_str(&s)
                .with_context(|| format!("parse {}", paths.config_file.display()))?;
            Ok(cfg)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to paths (with exclusive lock). Creates parent dirs if needed.
    pub fn save(&self, paths: &SyncPaths) -> Result<()> {
        if let Some(p) = paths.config_file.parent() {
            fs::create_dir_all(p)?;
        }
        let s = toml::to_string_pretty(self)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&paths.config_file)?;
        fs2::FileExt::lock_exclusive(&file)?;
        use std::io::Write;
        file.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Add or replace an entry. A replaced entry keeps its position.
    pub fn add(&mut self, id: String, path: String) {
        match self.certificates.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry.path = path,
            None => self.certificates.push(CaEntry { id, path }),
        }
    }

    /// Remove an entry; returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.certificates.len();
        self.certificates.retain(|e| e.id != id);
        self.certificates.len() != before
    }
}

/// `[certificates]` table <-> ordered `Vec<CaEntry>`; keeps file order.
mod ordered_entries {
    use super::CaEntry;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(entries: &[CaEntry], ser: S) -> Result<S::Ok, S::Error> {
        let mut map = ser.serialize_map(Some(entries.len()))?;
        for e in entries {
            map.serialize_entry(&e.id, &e.path)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<CaEntry>, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Vec<CaEntry>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of CA id = \"relative/path.pem\"")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some((id, path)) = access.next_entry::<String, String>()? {
                    out.push(CaEntry { id, path });
                }
                Ok(out)
            }
        }

        de.deserialize_map(EntriesVisitor)
    }
}
