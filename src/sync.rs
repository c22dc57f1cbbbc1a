//! The CA sync procedure: reset what was installed last time, then install
//! every configured CA again.

use std::path::{Path, PathBuf};

use crate::bundle;
use crate::config::CaEntry;
use crate::error::SyncError;
use crate::platform::TrustBundle;
use crate::store::{InstalledRecord, RecordStore};
use crate::trust;

/// Filesystem locations a sync run reads and writes.
#[derive(Debug, Clone)]
pub struct SyncTargets {
    /// Directory configured entry paths are relative to.
    pub source_dir: PathBuf,
    /// System trust directory.
    pub trust_dir: PathBuf,
    /// Runtime certificate bundle; bundle steps are skipped when `None`.
    pub runtime_bundle: Option<PathBuf>,
}

/// Why an entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Missing,
    Directory,
    /// Exists but is not a regular file (device, FIFO, socket).
    NotRegular,
    /// Id cannot be written into a bundle marker line.
    InvalidId,
}

/// Terminal state of one configured entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Skipped(SkipReason),
    Installed { filename: String },
    RolledBack,
}

/// What a run did. Skips and rollbacks do not make the run fail.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub removed: usize,
    pub entries: Vec<(String, EntryOutcome)>,
    pub regenerations: usize,
}

impl SyncReport {
    pub fn installed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(id, o)| match o {
            EntryOutcome::Installed { filename } => Some((id.as_str(), filename.as_str())),
            _ => None,
        })
    }

    pub fn outcome(&self, id: &str) -> Option<&EntryOutcome> {
        self.entries.iter().find(|(i, _)| i == id).map(|(_, o)| o)
    }
}

/// Counts regenerations for the report.
struct Regen<'a> {
    inner: &'a dyn TrustBundle,
    count: usize,
}

impl Regen<'_> {
    fn run(&mut self) -> Result<(), SyncError> {
        self.count += 1;
        self.inner.regenerate()
    }
}

/// Synchronize the trust store with `entries`.
///
/// The record is persisted empty once the reset phase succeeds, then again
/// after every successful installation.
pub fn sync_certificates(
    targets: &SyncTargets,
    entries: &[CaEntry],
    store: &dyn RecordStore,
    regenerator: &dyn TrustBundle,
) -> Result<SyncReport, SyncError> {
    let mut regen = Regen {
        inner: regenerator,
        count: 0,
    };
    let previous = store.load()?.unwrap_or_default();
    let removed = reset(targets, &previous, &mut regen)?;
    let mut record = InstalledRecord::new();
    store.save(&record)?;
    log::info!("Ready.");

    let mut report = SyncReport {
        removed,
        ..Default::default()
    };
    for entry in entries {
        let outcome = install_entry(targets, entry, &mut regen)?;
        if let EntryOutcome::Installed { filename } = &outcome {
            record.insert(entry.id.clone(), filename.clone());
            store.save(&record)?;
            log::info!("{} ({}) -> loaded.", entry.id, entry.path);
        }
        report.entries.push((entry.id.clone(), outcome));
    }
    report.regenerations = regen.count;
    Ok(report)
}

/// Remove every tracked CA, prune the runtime bundle, and regenerate once.
fn reset(
    targets: &SyncTargets,
    previous: &InstalledRecord,
    regen: &mut Regen<'_>,
) -> Result<usize, SyncError> {
    let removed = trust::remove_all_tracked(&targets.trust_dir, previous)?;
    if let Some(path) = &targets.runtime_bundle {
        bundle::prune(path, None)?;
    }
    regen.run()?;
    Ok(removed)
}

fn install_entry(
    targets: &SyncTargets,
    entry: &CaEntry,
    regen: &mut Regen<'_>,
) -> Result<EntryOutcome, SyncError> {
    if !bundle::is_valid_id(&entry.id) {
        log::warn!("{:?}: id contains control characters, skipped.", entry.id);
        return Ok(EntryOutcome::Skipped(SkipReason::InvalidId));
    }

    let source = targets.source_dir.join(&entry.path);
    let meta = match source.metadata() {
        Ok(m) => m,
        Err(_) => {
            log::warn!("{}: {} not found.", entry.id, entry.path);
            return Ok(EntryOutcome::Skipped(SkipReason::Missing));
        }
    };
    if meta.is_dir() {
        log::warn!("{} is not a CA file.", source.display());
        return Ok(EntryOutcome::Skipped(SkipReason::Directory));
    }
    if !meta.is_file() {
        log::warn!("{} is not a regular file.", source.display());
        return Ok(EntryOutcome::Skipped(SkipReason::NotRegular));
    }

    let content = std::fs::read(&source).map_err(|e| SyncError::Install {
        path: source.clone(),
        source: e,
    })?;
    if let Some(path) = &targets.runtime_bundle {
        bundle::append_block(path, &entry.id, &content)?;
    }
    let filename = trust::copy_with_unique_name(&targets.trust_dir, &entry.id, &source, &content)?;

    if regen.run().is_ok() {
        return Ok(EntryOutcome::Installed { filename });
    }

    log::warn!(
        "Unable to load {} ({}) into system CA. See previous errors.",
        entry.id,
        entry.path
    );
    roll_back(targets, &entry.id, &filename)?;
    if let Err(e) = regen.run() {
        log::warn!("trust bundle still failing after removing {filename}: {e}");
    }
    Ok(EntryOutcome::RolledBack)
}

fn roll_back(targets: &SyncTargets, id: &str, filename: &str) -> Result<(), SyncError> {
    trust::remove_one(&targets.trust_dir, filename).map_err(|e| {
        SyncError::FileRemoval(vec![(targets.trust_dir.join(filename), e)])
    })?;
    if let Some(path) = &targets.runtime_bundle {
        bundle::prune(path, Some(id))?;
    }
    Ok(())
}

/// Remove everything this system installed and persist an empty record.
pub fn purge(
    targets: &SyncTargets,
    store: &dyn RecordStore,
    regenerator: &dyn TrustBundle,
) -> Result<usize, SyncError> {
    let mut regen = Regen {
        inner: regenerator,
        count: 0,
    };
    let previous = store.load()?.unwrap_or_default();
    let removed = reset(targets, &previous, &mut regen)?;
    store.save(&InstalledRecord::new())?;
    Ok(removed)
}

/// Host entry point: require the source directory, then sync.
pub fn setup(
    targets: &SyncTargets,
    entries: &[CaEntry],
    store: &dyn RecordStore,
    regenerator: &dyn TrustBundle,
) -> Result<SyncReport, SyncError> {
    if !targets.source_dir.is_dir() {
        log::warn!(
            "Folder {} not found in configuration folder.",
            display_name(&targets.source_dir)
        );
        return Err(SyncError::ConfigDirectoryMissing(targets.source_dir.clone()));
    }

    sync_certificates(targets, entries, store, regenerator).map_err(|e| {
        log::warn!("Additional CA setup has been interrupted.");
        e
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
