//! CLI definitions and command routing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{Config, SyncPaths};
use crate::platform::{default_trust_bundle, TrustStoreLayout};
use crate::store::{JsonRecordStore, RecordStore};
use crate::sync::{EntryOutcome, SkipReason, SyncTargets};

#[derive(Parser)]
#[command(name = "ca-sync")]
#[command(about = "Keep additional CA certificates installed in the system trust store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove previously installed CAs, then install every configured CA
    Sync,
    /// List CAs installed by the last sync (id and trust-store filename)
    List,
    /// Add or replace a CA entry; path is relative to the additional_ca directory
    Add { id: String, path: String },
    /// Remove a CA entry from config (takes effect on next sync)
    Remove { id: String },
    /// Uninstall every CA this tool installed
    Purge,
    /// Check configuration, trust store, and installed files
    Doctor,
}

/// Run CLI and dispatch to handlers.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let paths = SyncPaths::default_paths();

    match cli.command {
        Commands::Sync => cmd_sync(&paths),
        Commands::List => cmd_list(&paths),
        Commands::Add { id, path } => {
            let mut config = Config::load(&paths)?;
            config.add(id.clone(), path.clone());
            config.save(&paths)?;
            println!("Added CA: {id} -> {path}");
            Ok(())
        }
        Commands::Remove { id } => {
            let mut config = Config::load(&paths)?;
            if !config.remove(&id) {
                anyhow::bail!("no CA entry named '{id}'");
            }
            config.save(&paths)?;
            println!("Removed CA: {id}");
            Ok(())
        }
        Commands::Purge => cmd_purge(&paths),
        Commands::Doctor => cmd_doctor(&paths),
    }
}

/// Resolve trust store layout and sync targets from config.
fn targets(paths: &SyncPaths, config: &Config) -> Result<(TrustStoreLayout, SyncTargets)> {
    let layout =
        TrustStoreLayout::resolve(&config.trust_store).context("resolve trust store")?;
    let targets = SyncTargets {
        source_dir: paths.source_dir.clone(),
        trust_dir: layout.dir.clone(),
        runtime_bundle: crate::bundle::locate(config.runtime_bundle.as_deref()),
    };
    Ok((layout, targets))
}

fn cmd_sync(paths: &SyncPaths) -> Result<()> {
    let config = Config::load(paths)?;
    let (layout, targets) = targets(paths, &config)?;
    let store = JsonRecordStore::new(&paths.record_file);
    let regenerator = default_trust_bundle(&layout);

    let report = crate::sync::setup(&targets, &config.certificates, &store, regenerator.as_ref())?;
    for (id, outcome) in &report.entries {
        match outcome {
            EntryOutcome::Installed { filename } => println!("{id}\tinstalled\t{filename}"),
            EntryOutcome::Skipped(SkipReason::Missing) => println!("{id}\tskipped (not found)"),
            EntryOutcome::Skipped(SkipReason::Directory) => {
                println!("{id}\tskipped (directory)")
            }
            EntryOutcome::Skipped(SkipReason::NotRegular) => {
                println!("{id}\tskipped (not a regular file)")
            }
            EntryOutcome::Skipped(SkipReason::InvalidId) => {
                println!("{id:?}\tskipped (invalid id)")
            }
            EntryOutcome::RolledBack => println!("{id}\trolled back"),
        }
    }
    Ok(())
}

fn cmd_list(paths: &SyncPaths) -> Result<()> {
    let record = JsonRecordStore::new(&paths.record_file)
        .load()?
        .unwrap_or_default();
    for (id, filename) in record.iter() {
        println!("{id}\t{filename}");
    }
    Ok(())
}

fn cmd_purge(paths: &SyncPaths) -> Result<()> {
    let config = Config::load(paths)?;
    let (layout, targets) = targets(paths, &config)?;
    let store = JsonRecordStore::new(&paths.record_file);
    let regenerator = default_trust_bundle(&layout);
    let removed = crate::sync::purge(&targets, &store, regenerator.as_ref())?;
    println!("Removed {removed} CA file(s) from {}", targets.trust_dir.display());
    Ok(())
}

fn cmd_doctor(paths: &SyncPaths) -> Result<()> {
    let config = Config::load(paths)?;
    let results = crate::doctor::run_checks(paths, &config)?;
    let mut failed = 0;
    for r in &results {
        let mark = if r.ok { "ok" } else { "FAIL" };
        println!("[{mark}] {}", r.message);
        if !r.ok {
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} check(s) failed");
    }
    Ok(())
}
