//! Share name validation.

use crate::error::{DaemonError, ValidationErrorKind};

/// Maximum share name length.
const MAX_SHARE_NAME_LENGTH: usize = 64;

/// Section names with special meaning in smb.conf.
const RESERVED_NAMES: &[&str] = &["global", "homes", "printers", "print$", "ipc$"];

/// Validate a share name.
///
/// Rules:
/// - 1 to 64 characters
/// - Must start with an ASCII letter or digit
/// - May only contain ASCII letters, digits, `.`, `_` and `-`
/// - Must not be a reserved Samba section name (case-insensitive)
///
/// # Example
///
/// ```
/// use share_daemon::validation::validate_share_name;
///
/// assert!(validate_share_name("docs").is_ok());
/// assert!(validate_share_name("docs]\n[global").is_err());
/// ```
pub fn validate_share_name(name: &str) -> Result<(), DaemonError> {
    let invalid = || DaemonError::Validation {
        kind: ValidationErrorKind::InvalidShareName {
            name: name.to_string(),
        },
    };

    if name.is_empty() || name.len() > MAX_SHARE_NAME_LENGTH {
        return Err(invalid());
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-') {
        return Err(invalid());
    }

    if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(invalid());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_share_name("docs").is_ok());
        assert!(validate_share_name("Media_2024").is_ok());
        assert!(validate_share_name("backup.daily-1").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(validate_share_name("").is_err());
        assert!(validate_share_name("-docs").is_err());
        assert!(validate_share_name("my docs").is_err());
        assert!(validate_share_name("docs/../etc").is_err());
        assert!(validate_share_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_injection_attempts() {
        assert!(validate_share_name("docs]\n[global").is_err());
        assert!(validate_share_name("docs;reboot").is_err());
        assert!(validate_share_name("docs\tpath = /").is_err());
    }

    #[test]
    fn test_reserved_names() {
        assert!(validate_share_name("global").is_err());
        assert!(validate_share_name("GLOBAL").is_err());
        assert!(validate_share_name("homes").is_err());
    }
}
