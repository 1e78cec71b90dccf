//! Atomic replacement of live configuration files.
//!
//! A live file is only ever replaced by writing a temp file next to it,
//! syncing it, and renaming it over the target. Readers see either the old
//! file or the new one, never a partial write.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{chown, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Mode for files that did not exist before.
const DEFAULT_MODE: u32 = 0o644;

/// Replaces live configuration files.
///
/// The orchestrator writes through this trait so tests can observe or fail
/// individual writes.
pub trait ConfigWriter: Send + Sync {
    /// Replace `path` with `content`. On error the previous file is untouched.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;
}

/// Writer backed by [`atomic_write`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicWriter;

impl ConfigWriter for AtomicWriter {
    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        atomic_write(path, content)
    }
}

/// Atomically replace `path` with `content`.
///
/// The previous file's mode and ownership carry over to the new one. The
/// parent directory is synced after the rename so the swap survives a crash.
pub fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    atomic_write_with(path, content, |_| Ok(()))
}

/// [`atomic_write`] with a hook that runs on the synced temp file right
/// before the rename. A hook error aborts the write.
pub(crate) fn atomic_write_with<F>(path: &Path, content: &str, before_rename: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let parent = parent_dir(path);
    if !parent.exists() {
        fs::create_dir_all(&parent)?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

    // Random suffix plus O_EXCL so a pre-planted symlink cannot redirect the write.
    let temp_path = parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple()
    ));
    let guard = TempGuard(Some(temp_path.clone()));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;
    file.write_all(content.as_bytes())?;

    match fs::metadata(path) {
        Ok(previous) => {
            file.set_permissions(fs::Permissions::from_mode(previous.mode() & 0o7777))?;
            let current = file.metadata()?;
            if current.uid() != previous.uid() || current.gid() != previous.gid() {
                chown(&temp_path, Some(previous.uid()), Some(previous.gid()))?;
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            file.set_permissions(fs::Permissions::from_mode(DEFAULT_MODE))?;
        }
        Err(e) => return Err(e),
    }

    file.sync_all()?;
    drop(file);

    before_rename(&temp_path)?;

    fs::rename(&temp_path, path)?;
    guard.disarm();
    sync_dir(&parent);

    debug!(path = %path.display(), bytes = content.len(), "File replaced atomically");

    Ok(())
}

/// Remove `path` and sync its directory. A missing file is not an error.
pub fn remove_durably(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            sync_dir(&parent_dir(path));
            debug!(path = %path.display(), "File removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!(dir = %dir.display(), error = %e, "Failed to sync directory");
    }
}

/// Removes the temp file unless the rename succeeded.
struct TempGuard(Option<PathBuf>);

impl TempGuard {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_creates_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smb.conf");

        atomic_write(&path, "[global]\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[global]\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, DEFAULT_MODE);
        assert!(temp_files(dir.path()).is_empty());
    }

    #[test]
    fn test_replaces_and_keeps_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports");
        fs::write(&path, "old\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        atomic_write(&path, "new\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vsftpd").join("vsftpd.conf");
        atomic_write(&path, "listen=YES\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "listen=YES\n");
    }

    #[test]
    fn test_failure_before_rename_leaves_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nginx.conf");
        fs::write(&path, "old\n").unwrap();

        let result = atomic_write_with(&path, "new\n", |temp| {
            // The candidate is complete on disk before the swap.
            assert_eq!(fs::read_to_string(temp).unwrap(), "new\n");
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
        assert!(temp_files(dir.path()).is_empty());
    }

    #[test]
    fn test_remove_durably() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports");
        fs::write(&path, "x").unwrap();

        remove_durably(&path).unwrap();
        assert!(!path.exists());
        // Already gone is fine.
        remove_durably(&path).unwrap();
    }
}
