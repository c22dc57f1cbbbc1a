//! Shared test helpers.

#![allow(dead_code)]

use ca_sync::config::{CaEntry, SyncPaths};
use ca_sync::platform::TrustBundle;
use ca_sync::store::JsonRecordStore;
use ca_sync::sync::SyncTargets;
use ca_sync::SyncError;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temp directory for use as CA_SYNC_HOME.
pub fn temp_home() -> TempDir {
    tempfile::Builder::new()
        .prefix("ca_sync_test_")
        .tempdir()
        .expect("temp dir")
}

/// Run a closure with CA_SYNC_HOME set to the given path.
pub fn with_test_env<F, R>(home: &Path, f: F) -> R
where
    F: FnOnce() -> R,
{
    let prev = std::env::var_os("CA_SYNC_HOME");
    std::env::set_var("CA_SYNC_HOME", home);
    let r = f();
    match prev {
        Some(v) => std::env::set_var("CA_SYNC_HOME", v),
        None => std::env::remove_var("CA_SYNC_HOME"),
    }
    r
}

/// Self-signed CA certificate in PEM form.
pub fn ca_pem(common_name: &str) -> String {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::default();
    params.distinguished_name = rcgen::DistinguishedName::new();
    params.distinguished_name.push(
        rcgen::DnType::CommonName,
        rcgen::DnValue::Utf8String(common_name.to_string()),
    );
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    params.self_signed(&key_pair).unwrap().pem()
}

/// Bundle content shipped by the "runtime" before any sync.
pub const SHIPPED_BUNDLE: &str =
    "# Issuer: CN=Shipped Root\n-----BEGIN CERTIFICATE-----\nU0hJUFBFRA==\n-----END CERTIFICATE-----\n";

/// A base dir with source, trust, and runtime bundle locations laid out.
pub struct Fixture {
    pub home: TempDir,
    pub paths: SyncPaths,
    pub targets: SyncTargets,
    pub store: JsonRecordStore,
}

impl Fixture {
    pub fn new() -> Self {
        let home = temp_home();
        let paths = SyncPaths::for_test(home.path());
        std::fs::create_dir_all(&paths.source_dir).unwrap();
        let trust_dir = home.path().join("trust");
        std::fs::create_dir_all(&trust_dir).unwrap();
        let bundle = home.path().join("cacert.pem");
        std::fs::write(&bundle, SHIPPED_BUNDLE).unwrap();
        let targets = SyncTargets {
            source_dir: paths.source_dir.clone(),
            trust_dir,
            runtime_bundle: Some(bundle),
        };
        let store = JsonRecordStore::new(&paths.record_file);
        Self {
            home,
            paths,
            targets,
            store,
        }
    }

    /// Write a source CA file and return its PEM text.
    pub fn add_source(&self, rel: &str, content: &str) -> String {
        let path = self.paths.source_dir.join(rel);
        if let Some(p) = path.parent() {
            std::fs::create_dir_all(p).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        content.to_string()
    }

    pub fn trust_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.targets.trust_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn bundle_text(&self) -> String {
        std::fs::read_to_string(self.targets.runtime_bundle.as_ref().unwrap()).unwrap()
    }

    pub fn trust_dir(&self) -> PathBuf {
        self.targets.trust_dir.clone()
    }
}

pub fn entries(pairs: &[(&str, &str)]) -> Vec<CaEntry> {
    pairs
        .iter()
        .map(|(id, path)| CaEntry {
            id: id.to_string(),
            path: path.to_string(),
        })
        .collect()
}

/// Regenerator that counts calls and fails on the listed call numbers (1-based).
#[derive(Default)]
pub struct FakeTrustBundle {
    calls: Cell<usize>,
    fail_on: Vec<usize>,
}

impl FakeTrustBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            calls: Cell::new(0),
            fail_on: calls.to_vec(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl TrustBundle for FakeTrustBundle {
    fn regenerate(&self) -> Result<(), SyncError> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        if self.fail_on.contains(&n) {
            return Err(SyncError::TrustBundleRegen {
                command: "fake-update-ca".into(),
                reason: format!("call {n} rejected"),
            });
        }
        Ok(())
    }
}

/// Regenerator that rejects the trust directory while any file in it lacks a PEM header,
/// the way a distribution's rebuild tool complains on stderr about a bad anchor.
pub struct PemCheckingTrustBundle {
    pub trust_dir: PathBuf,
    pub calls: Cell<usize>,
}

impl PemCheckingTrustBundle {
    pub fn new(trust_dir: PathBuf) -> Self {
        Self {
            trust_dir,
            calls: Cell::new(0),
        }
    }
}

impl TrustBundle for PemCheckingTrustBundle {
    fn regenerate(&self) -> Result<(), SyncError> {
        self.calls.set(self.calls.get() + 1);
        for entry in std::fs::read_dir(&self.trust_dir).unwrap() {
            let path = entry.unwrap().path();
            let text = std::fs::read_to_string(&path).unwrap_or_default();
            if !text.contains("-----BEGIN CERTIFICATE-----") {
                return Err(SyncError::TrustBundleRegen {
                    command: "pem-check".into(),
                    reason: format!("WARNING: {} does not contain a certificate", path.display()),
                });
            }
        }
        Ok(())
    }
}
