//! Validation of free-form values embedded in configuration directives.

use crate::error::{DaemonError, ValidationErrorKind};

/// Maximum length of a directive value.
const MAX_VALUE_LENGTH: usize = 256;

/// Maximum length of a directive key.
const MAX_KEY_LENGTH: usize = 64;

/// Validate a value that will be written on a single configuration line.
///
/// Rejects control characters (newlines would start a new directive) and
/// values longer than 256 characters.
pub fn validate_directive_value(param: &str, value: &str) -> Result<(), DaemonError> {
    if value.len() > MAX_VALUE_LENGTH {
        return Err(DaemonError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: param.to_string(),
                message: format!("value exceeds {} characters", MAX_VALUE_LENGTH),
            },
        });
    }

    if value.chars().any(|c| c.is_control()) {
        return Err(DaemonError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: param.to_string(),
                message: "value contains control characters".to_string(),
            },
        });
    }

    Ok(())
}

/// Characters that end or open an Nginx directive, start a comment, or
/// open a quoted string.
const NGINX_METACHARACTERS: &[char] = &[';', '{', '}', '#', '"', '\'', '\\'];

/// Validate a value written as an Nginx directive argument.
///
/// On top of [`validate_directive_value`], rejects characters that would
/// let the value close the directive and inject another.
pub fn validate_nginx_value(param: &str, value: &str) -> Result<(), DaemonError> {
    validate_directive_value(param, value)?;

    if let Some(c) = value.chars().find(|c| NGINX_METACHARACTERS.contains(c)) {
        return Err(DaemonError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: param.to_string(),
                message: format!("'{}' is not allowed in nginx directive values", c),
            },
        });
    }

    Ok(())
}

/// Validate the key of an extra global directive.
///
/// Keys are lowercase words separated by single spaces or underscores
/// (`log level`, `pasv_min_port`).
pub fn validate_directive_key(key: &str) -> Result<(), DaemonError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key.starts_with(|c: char| c.is_ascii_lowercase())
        && !key.ends_with(' ')
        && !key.contains("  ")
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == ' ');

    if valid {
        Ok(())
    } else {
        Err(DaemonError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: format!("option '{}'", key),
                message: "option names may only contain lowercase letters, digits, '_' and single spaces"
                    .to_string(),
            },
        })
    }
}
