//! Append-only JSON-lines audit trail.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::DaemonError;

use super::entry::AuditEntry;

/// Mode for a newly created trail; existing files keep theirs.
const AUDIT_FILE_MODE: u32 = 0o640;

/// Writes one JSON object per line. Shared between worker threads.
pub struct AuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    /// Open `path` for appending, creating it and its directory if needed.
    pub fn open(path: &Path) -> Result<Self, DaemonError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(AUDIT_FILE_MODE)
            .open(path)?;

        debug!(path = %path.display(), "Audit trail opened");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Append `entry` as a single write, then sync.
    pub fn log(&self, entry: &AuditEntry) -> Result<(), DaemonError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(&line)?;
        if let Err(e) = file.sync_data() {
            warn!(path = %self.path.display(), error = %e, "Audit trail not synced");
        }

        debug!(
            operation_id = %entry.operation_id,
            action = %entry.action,
            service = %entry.service,
            "Audit entry written"
        );
        Ok(())
    }

    /// [`log`](Self::log), with failures reduced to a warning so the audited
    /// action is never failed by its audit record.
    pub fn record(&self, entry: &AuditEntry) {
        if let Err(e) = self.log(entry) {
            warn!(
                operation_id = %entry.operation_id,
                action = %entry.action,
                error = %e,
                "Audit entry dropped"
            );
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
