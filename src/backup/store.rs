//! On-disk snapshot store.
//!
//! Layout: `<dir>/<service>/<id>.json`, one JSON document per snapshot.
//! Only the newest `retention` snapshots of each service are kept.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::error::{DaemonError, ServiceErrorKind};
use crate::files::{atomic_write, remove_durably};

use super::snapshot::ConfigSnapshot;

/// Persistent, per-service snapshot history.
pub struct BackupStore {
    dir: PathBuf,
    retention: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BackupStore {
    /// Create a store rooted at `dir` keeping `retention` snapshots per service.
    ///
    /// A retention of zero is treated as one; the latest snapshot is always kept.
    pub fn new(dir: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            dir: dir.into(),
            retention: retention.max(1),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Record the current content of `live_path` (or its absence).
    pub fn snapshot(&self, service: &str, live_path: &Path) -> Result<ConfigSnapshot, DaemonError> {
        let lock = self.service_lock(service);
        let _guard = hold(&lock);

        let failure = |message: String| {
            DaemonError::service(ServiceErrorKind::BackupFailure {
                path: live_path.to_path_buf(),
                message,
            })
        };

        let content = match fs::read_to_string(live_path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(failure(format!("cannot read live file: {}", e))),
        };

        let ids = self
            .snapshot_ids(service)
            .map_err(|e| failure(format!("cannot list snapshots: {}", e)))?;
        let id = ids.first().map_or(1, |newest| newest + 1);

        let snapshot = ConfigSnapshot::new(id, service, live_path.to_path_buf(), content);
        let encoded = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| failure(format!("cannot encode snapshot: {}", e)))?;
        atomic_write(&self.snapshot_path(service, id), &encoded)
            .map_err(|e| failure(format!("cannot store snapshot: {}", e)))?;

        info!(
            service,
            snapshot_id = id,
            absent = snapshot.is_absent(),
            "Snapshot taken"
        );

        self.prune(service, &ids);

        Ok(snapshot)
    }

    /// Rewrite the live file from the most recent snapshot.
    ///
    /// A snapshot that recorded an absent file removes the live file.
    pub fn restore(&self, service: &str) -> Result<ConfigSnapshot, DaemonError> {
        let lock = self.service_lock(service);
        let _guard = hold(&lock);

        let snapshot = self.latest_unlocked(service)?.ok_or_else(|| {
            DaemonError::service(ServiceErrorKind::NoSnapshotAvailable {
                service: service.to_string(),
            })
        })?;

        if !snapshot.is_intact() {
            return Err(DaemonError::service(ServiceErrorKind::BackupFailure {
                path: self.snapshot_path(service, snapshot.id),
                message: "snapshot content does not match its hash".to_string(),
            }));
        }

        let written = match &snapshot.content {
            Some(content) => atomic_write(&snapshot.live_path, content),
            None => remove_durably(&snapshot.live_path),
        };
        written.map_err(|e| {
            DaemonError::service(ServiceErrorKind::ApplyFailure {
                path: snapshot.live_path.clone(),
                message: format!("restore of snapshot {} failed: {}", snapshot.id, e),
            })
        })?;

        info!(
            service,
            snapshot_id = snapshot.id,
            path = %snapshot.live_path.display(),
            "Live file restored from snapshot"
        );

        Ok(snapshot)
    }

    /// Snapshots of `service`, most recent first.
    pub fn list(&self, service: &str) -> Result<Vec<ConfigSnapshot>, DaemonError> {
        let lock = self.service_lock(service);
        let _guard = hold(&lock);

        let ids = self.snapshot_ids(service)?;
        Ok(ids
            .into_iter()
            .filter_map(|id| self.load(service, id))
            .collect())
    }

    /// The most recent snapshot of `service`, if any.
    pub fn latest(&self, service: &str) -> Result<Option<ConfigSnapshot>, DaemonError> {
        let lock = self.service_lock(service);
        let _guard = hold(&lock);
        self.latest_unlocked(service)
    }

    fn latest_unlocked(&self, service: &str) -> Result<Option<ConfigSnapshot>, DaemonError> {
        Ok(self
            .snapshot_ids(service)?
            .into_iter()
            .find_map(|id| self.load(service, id)))
    }

    fn service_dir(&self, service: &str) -> PathBuf {
        self.dir.join(service)
    }

    fn snapshot_path(&self, service: &str, id: u64) -> PathBuf {
        self.service_dir(service).join(format!("{}.json", id))
    }

    /// Snapshot ids on disk, newest first.
    fn snapshot_ids(&self, service: &str) -> Result<Vec<u64>, io::Error> {
        let entries = match fs::read_dir(self.service_dir(service)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut ids: Vec<u64> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                name.strip_suffix(".json")?.parse().ok()
            })
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(ids)
    }

    fn load(&self, service: &str, id: u64) -> Option<ConfigSnapshot> {
        let path = self.snapshot_path(service, id);
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                serde_json::from_str::<ConfigSnapshot>(&text).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(service, snapshot_id = id, path = %path.display(), error = %e, "Skipping unreadable snapshot");
                None
            }
        }
    }

    /// Delete snapshots beyond retention. `previous` are the ids that existed
    /// before the snapshot just written.
    fn prune(&self, service: &str, previous: &[u64]) {
        let keep_previous = self.retention.saturating_sub(1);
        for &id in previous.iter().skip(keep_previous) {
            let path = self.snapshot_path(service, id);
            match fs::remove_file(&path) {
                Ok(()) => debug!(service, snapshot_id = id, "Pruned snapshot"),
                Err(e) => warn!(service, snapshot_id = id, error = %e, "Failed to prune snapshot"),
            }
        }
    }

    fn service_lock(&self, service: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(service.to_string()).or_default().clone()
    }
}

fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}
