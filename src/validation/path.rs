//! Share source path validation.

use std::path::{Component, Path, PathBuf};

use crate::error::{DaemonError, ValidationErrorKind};

/// Directories that must never be exported, nor anything below them.
const PROTECTED_TREES: &[&str] = &["/proc", "/sys", "/dev", "/boot", "/etc", "/root", "/run"];

/// Validate a share source path without touching the filesystem.
///
/// # Security Checks
///
/// 1. Path must be absolute and non-empty
/// 2. Path must not contain `..` components
/// 3. Path must not contain control characters, quotes or backslashes, since
///    it is embedded verbatim in generated configuration files
/// 4. Path must not be `/` or lie inside a protected system tree
pub fn validate_share_path(path: &Path) -> Result<(), DaemonError> {
    let path_str = path.to_string_lossy();

    if path_str.is_empty() {
        return Err(invalid(path, "path cannot be empty"));
    }

    if !path.is_absolute() {
        return Err(invalid(path, "path must be absolute"));
    }

    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(DaemonError::Validation {
            kind: ValidationErrorKind::PathTraversal {
                path: path.to_path_buf(),
            },
        });
    }

    if path_str
        .chars()
        .any(|c| c.is_control() || c == '"' || c == '\\')
    {
        return Err(invalid(
            path,
            "path contains control characters, quotes or backslashes",
        ));
    }

    let normalized: PathBuf = path.components().collect();
    if normalized == Path::new("/") {
        return Err(DaemonError::Validation {
            kind: ValidationErrorKind::PathNotAllowed {
                path: path.to_path_buf(),
            },
        });
    }

    if PROTECTED_TREES
        .iter()
        .any(|tree| normalized.starts_with(tree))
    {
        return Err(DaemonError::Validation {
            kind: ValidationErrorKind::PathNotAllowed {
                path: path.to_path_buf(),
            },
        });
    }

    Ok(())
}

/// Check that a share source path exists and is a directory.
pub fn check_share_directory(path: &Path) -> Result<(), DaemonError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(invalid(path, "path is not a directory")),
        Err(e) => Err(invalid(path, &format!("path is not accessible: {}", e))),
    }
}

fn invalid(path: &Path, message: &str) -> DaemonError {
    DaemonError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: format!("path '{}'", path.display()),
            message: message.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert!(validate_share_path(Path::new("/srv/docs")).is_ok());
        assert!(validate_share_path(Path::new("/mnt/pool/media library")).is_ok());
        assert!(validate_share_path(Path::new("/srv/docs/")).is_ok());
    }

    #[test]
    fn test_empty_and_relative_paths() {
        assert!(validate_share_path(Path::new("")).is_err());
        assert!(validate_share_path(Path::new("srv/docs")).is_err());
    }

    #[test]
    fn test_traversal() {
        let result = validate_share_path(Path::new("/srv/../etc"));
        assert!(matches!(
            result,
            Err(DaemonError::Validation {
                kind: ValidationErrorKind::PathTraversal { .. }
            })
        ));
    }

    #[test]
    fn test_protected_paths() {
        assert!(validate_share_path(Path::new("/")).is_err());
        assert!(validate_share_path(Path::new("/etc")).is_err());
        assert!(validate_share_path(Path::new("/etc/samba")).is_err());
        assert!(validate_share_path(Path::new("/proc/1")).is_err());
        // Prefix match is by component, not by string
        assert!(validate_share_path(Path::new("/etcetera")).is_ok());
    }

    #[test]
    fn test_injection_characters() {
        assert!(validate_share_path(Path::new("/srv/docs\n[evil]")).is_err());
        assert!(validate_share_path(Path::new("/srv/\"docs\"")).is_err());
    }

    #[test]
    fn test_check_share_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_share_directory(dir.path()).is_ok());

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(check_share_directory(&file).is_err());
        assert!(check_share_directory(&dir.path().join("missing")).is_err());
    }
}
