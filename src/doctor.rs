//! Doctor command: health checks for ca-sync configuration.

use anyhow::Result;

use crate::config::{Config, SyncPaths};
use crate::platform::TrustStoreLayout;
use crate::store::{JsonRecordStore, RecordStore};

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub ok: bool,
    pub message: String,
}

impl CheckResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Run all doctor checks. Nothing is modified.
pub fn run_checks(paths: &SyncPaths, config: &Config) -> Result<Vec<CheckResult>> {
    let mut results = Vec::new();

    // 1. Source directory
    if paths.source_dir.is_dir() {
        results.push(CheckResult::pass(format!(
            "CA source directory {}",
            paths.source_dir.display()
        )));
    } else {
        results.push(CheckResult::fail(format!(
            "CA source directory {} missing. Create it and place CA files there.",
            paths.source_dir.display()
        )));
    }

    // 2. Trust store layout and regeneration command
    let layout = match TrustStoreLayout::resolve(&config.trust_store) {
        Ok(layout) => Some(layout),
        Err(e) => {
            results.push(CheckResult::fail(format!(
                "{e}. Set [trust_store] dir and command in config.toml."
            )));
            None
        }
    };
    if let Some(layout) = &layout {
        if layout.dir.is_dir() {
            results.push(CheckResult::pass(format!(
                "trust directory {}",
                layout.dir.display()
            )));
        } else {
            results.push(CheckResult::fail(format!(
                "trust directory {} does not exist",
                layout.dir.display()
            )));
        }
        match which::which(&layout.program) {
            Ok(bin) => results.push(CheckResult::pass(format!(
                "regeneration command '{}' ({})",
                layout.command_line(),
                bin.display()
            ))),
            Err(_) => results.push(CheckResult::fail(format!(
                "regeneration command '{}' not found on PATH",
                layout.program
            ))),
        }
    }

    // 3. Runtime bundle
    match crate::bundle::locate(config.runtime_bundle.as_deref()) {
        Some(p) if p.is_file() => {
            results.push(CheckResult::pass(format!("runtime bundle {}", p.display())));
        }
        Some(p) => results.push(CheckResult::fail(format!(
            "runtime bundle {} does not exist",
            p.display()
        ))),
        None => results.push(CheckResult::pass(
            "no runtime bundle configured; only the system trust store is updated",
        )),
    }

    // 4. Configured entries
    for entry in &config.certificates {
        let source = paths.source_dir.join(&entry.path);
        if source.is_file() {
            results.push(CheckResult::pass(format!("[{}] {}", entry.id, entry.path)));
        } else if source.is_dir() {
            results.push(CheckResult::fail(format!(
                "[{}] {} is a directory, not a CA file",
                entry.id, entry.path
            )));
        } else {
            results.push(CheckResult::fail(format!(
                "[{}] {} not found",
                entry.id, entry.path
            )));
        }
    }

    // 5. Tracked files still present
    let record = JsonRecordStore::new(&paths.record_file)
        .load()?
        .unwrap_or_default();
    if let Some(layout) = &layout {
        for (id, filename) in record.iter() {
            if layout.dir.join(filename).is_file() {
                results.push(CheckResult::pass(format!("[{id}] installed as {filename}")));
            } else {
                results.push(CheckResult::fail(format!(
                    "[{id}] {filename} recorded but missing. Run 'ca-sync sync'."
                )));
            }
        }
    }

    Ok(results)
}
