//! Audit log of raw Authority responses.
//!
//! Every response is kept as `<dir>/<operation>-<reference>-<YYYYMMDD-HHMMSS>.xml`.
//! Files older than the retention window are pruned before each write.

use crate::error::{CliError, CliResult};
use nfesync_engine::Clock;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Writes and prunes audit files.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
    retention: Duration,
}

impl AuditLog {
    /// Creates an audit log in `dir` keeping files for `retention_days`.
    pub fn new(dir: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self {
            dir: dir.into(),
            retention: Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60),
        }
    }

    /// Prunes, then writes `content` and returns the new file's path.
    ///
    /// The timestamp in the name comes from `clock`.
    pub fn write(
        &self,
        clock: &dyn Clock,
        operation: &str,
        reference: &str,
        content: &str,
    ) -> CliResult<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| CliError::io(&self.dir, e))?;
        self.prune(SystemTime::now());

        let stamp = clock.now().format("%Y%m%d-%H%M%S");
        let path = self.dir.join(format!("{operation}-{reference}-{stamp}.xml"));
        fs::write(&path, content).map_err(|e| CliError::io(&path, e))?;
        debug!(path = %path.display(), "response saved");
        Ok(path)
    }

    /// Removes `.xml` files last modified before `now - retention`.
    ///
    /// Returns how many were removed. Failures are logged and skipped.
    pub fn prune(&self, now: SystemTime) -> usize {
        let Some(cutoff) = now.checked_sub(self.retention) else {
            return 0;
        };
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "cannot list audit log");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                continue;
            }
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot stat audit file");
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "failed to prune audit file"),
            }
        }
        if removed > 0 {
            debug!(removed, dir = %self.dir.display(), "pruned old audit files");
        }
        removed
    }
}
