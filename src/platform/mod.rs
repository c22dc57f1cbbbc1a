//! Platform abstraction for the system trust store.

use std::path::{Path, PathBuf};

pub mod unix;

use crate::config::TrustStoreConfig;
use crate::error::SyncError;

/// Trait for rebuilding the system trust bundle from the trust directory.
pub trait TrustBundle {
    /// Run the rebuild; any failure leaves the caller to restore state.
    fn regenerate(&self) -> Result<(), SyncError>;
}

/// Known anchor directories and the command that rebuilds each, in probe order.
const KNOWN_LAYOUTS: &[(&str, &str, &[&str])] = &[
    ("usr/local/share/ca-certificates", "update-ca-certificates", &[]),
    ("etc/pki/ca-trust/source/anchors", "update-ca-trust", &["extract"]),
    ("etc/ca-certificates/trust-source/anchors", "trust", &["extract-compat"]),
    ("usr/share/pki/trust/anchors", "update-ca-certificates", &[]),
];

/// Where CA files go and how the bundle is rebuilt afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStoreLayout {
    pub dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,
}

impl TrustStoreLayout {
    /// Probe the running system's well-known anchor directories.
    pub fn detect() -> Result<Self, SyncError> {
        Self::detect_under(Path::new("/"))
    }

    /// Probe anchor directories below `root`; first existing directory wins.
    pub fn detect_under(root: &Path) -> Result<Self, SyncError> {
        for (dir, program, args) in KNOWN_LAYOUTS {
            let candidate = root.join(dir);
            if candidate.is_dir() {
                log::debug!("trust store detected at {}", candidate.display());
                return Ok(Self {
                    dir: candidate,
                    program: program.to_string(),
                    args: args.iter().map(|a| a.to_string()).collect(),
                });
            }
        }
        Err(SyncError::TrustStoreNotFound)
    }

    /// Apply config overrides; whatever the config leaves out is detected.
    pub fn resolve(cfg: &TrustStoreConfig) -> Result<Self, SyncError> {
        let command = cfg.command.as_deref().and_then(|c| c.split_first());
        match (&cfg.dir, command) {
            (Some(dir), Some((program, args))) => Ok(Self {
                dir: dir.clone(),
                program: program.clone(),
                args: args.to_vec(),
            }),
            (dir, command) => {
                let mut layout = Self::detect()?;
                if let Some(dir) = dir {
                    layout.dir = dir.clone();
                }
                if let Some((program, args)) = command {
                    layout.program = program.clone();
                    layout.args = args.to_vec();
                }
                Ok(layout)
            }
        }
    }

    /// Command line as shown in logs and errors.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Get the platform regenerator for a layout.
pub fn default_trust_bundle(layout: &TrustStoreLayout) -> Box<dyn TrustBundle> {
    Box::new(unix::CommandTrustBundle::new(layout))
}
