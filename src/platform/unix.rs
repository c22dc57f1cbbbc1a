//! Unix (Linux distributions) trust bundle regeneration.

use std::process::{Command, Stdio};

use super::{TrustBundle, TrustStoreLayout};
use crate::error::SyncError;

/// Runs the distribution's rebuild command, e.g. `update-ca-certificates`.
pub struct CommandTrustBundle {
    layout: TrustStoreLayout,
}

impl CommandTrustBundle {
    pub fn new(layout: &TrustStoreLayout) -> Self {
        Self {
            layout: layout.clone(),
        }
    }
}

impl TrustBundle for CommandTrustBundle {
    /// Succeeds only on exit status 0 with nothing written to stderr.
    fn regenerate(&self) -> Result<(), SyncError> {
        let command = self.layout.command_line();
        log::debug!("Executing {command}");

        let fail = |reason: String| {
            log::warn!("'{command}' returned an error -> {reason}");
            SyncError::TrustBundleRegen {
                command: command.clone(),
                reason,
            }
        };

        let output = Command::new(&self.layout.program)
            .args(&self.layout.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| fail(e.to_string()))?;

        if !output.status.success() {
            return Err(fail(format!("exited with {}", output.status)));
        }
        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(stderr.trim_end().to_string()));
        }
        Ok(())
    }
}
