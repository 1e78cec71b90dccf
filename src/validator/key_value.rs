//! `key=value` checker for vsftpd-style files.

use std::collections::HashSet;

/// Keys whose value must be `YES` or `NO`.
const BOOLEAN_KEYS: &[&str] = &[
    "listen",
    "listen_ipv6",
    "anonymous_enable",
    "local_enable",
    "write_enable",
    "chroot_local_user",
    "allow_writeable_chroot",
    "no_anon_password",
    "anon_upload_enable",
    "anon_mkdir_write_enable",
    "pasv_enable",
    "ssl_enable",
    "xferlog_enable",
    "use_localtime",
];

/// Keys whose value must be a non-negative integer.
const NUMERIC_KEYS: &[&str] = &[
    "listen_port",
    "pasv_min_port",
    "pasv_max_port",
    "max_clients",
    "max_per_ip",
    "idle_session_timeout",
    "data_connection_timeout",
    "local_umask",
    "anon_umask",
];

/// Check a `key=value` file. On failure returns one message per bad line.
///
/// vsftpd refuses whitespace around `=`, so `key = value` is an error here
/// too. A key set twice is rejected because only one of the values would win.
pub fn check_key_value(content: &str) -> Result<(), String> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(message) = check_line(line, &mut seen) {
            errors.push(format!("line {}: {}", index + 1, message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("\n"))
    }
}

fn check_line<'a>(line: &'a str, seen: &mut HashSet<&'a str>) -> Result<(), String> {
    let (key, value) = line
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, found '{}'", line))?;

    let key_ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !key_ok {
        return Err(format!("invalid key '{}'", key));
    }

    if value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace) {
        return Err(format!("value of '{}' has surrounding whitespace", key));
    }

    if !seen.insert(key) {
        return Err(format!("'{}' is set more than once", key));
    }

    if BOOLEAN_KEYS.contains(&key) && !matches!(value.to_ascii_uppercase().as_str(), "YES" | "NO") {
        return Err(format!("'{}' must be YES or NO, found '{}'", key, value));
    }

    if NUMERIC_KEYS.contains(&key) && value.parse::<u32>().is_err() {
        return Err(format!("'{}' must be a number, found '{}'", key, value));
    }

    Ok(())
}
