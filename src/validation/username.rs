//! Share user validation.
//!
//! Validates user and group names placed in share access lists.

use crate::error::{DaemonError, ValidationErrorKind};

/// Maximum length for system usernames (Linux standard).
const MAX_USERNAME_LENGTH: usize = 32;

/// Validate a user (or `@group`) allowed to access a share.
///
/// Rules:
/// - An optional leading `@` marks a group
/// - The remaining name must not be empty or exceed 32 characters
/// - Must start with a lowercase letter or underscore
/// - May only contain lowercase letters, digits, underscores, hyphens and dots
pub fn validate_share_user(entry: &str) -> Result<(), DaemonError> {
    let name = entry.strip_prefix('@').unwrap_or(entry);

    let invalid = |message: &str| DaemonError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: format!("user '{}'", entry),
            message: message.to_string(),
        },
    };

    let first = match name.chars().next() {
        Some(c) => c,
        None => return Err(invalid("user name cannot be empty")),
    };

    if name.len() > MAX_USERNAME_LENGTH {
        return Err(invalid(&format!(
            "user name exceeds maximum length of {} characters",
            MAX_USERNAME_LENGTH
        )));
    }

    if !first.is_ascii_lowercase() && first != '_' {
        return Err(invalid("user name must start with a lowercase letter or underscore"));
    }

    for c in name.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && !matches!(c, '_' | '-' | '.') {
            return Err(DaemonError::Validation {
                kind: ValidationErrorKind::InvalidUsername {
                    username: entry.to_string(),
                },
            });
        }
    }

    Ok(())
}
