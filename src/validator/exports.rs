//! `/etc/exports` table checker.
//!
//! There is no offline checker for exports; `exportfs` only reads the live
//! table. This parser accepts the subset of exports(5) that a managed table
//! may contain and reports every bad line at once.

use crate::validation::validate_network;

/// Options that take no value.
const FLAG_OPTIONS: &[&str] = &[
    "ro",
    "rw",
    "sync",
    "async",
    "secure",
    "insecure",
    "wdelay",
    "no_wdelay",
    "hide",
    "nohide",
    "crossmnt",
    "subtree_check",
    "no_subtree_check",
    "insecure_locks",
    "no_auth_nlm",
    "secure_locks",
    "auth_nlm",
    "no_acl",
    "root_squash",
    "no_root_squash",
    "all_squash",
    "no_all_squash",
    "mp",
    "pnfs",
    "no_pnfs",
];

/// Options written as `name=value`.
const VALUE_OPTIONS: &[&str] = &[
    "fsid",
    "anonuid",
    "anongid",
    "sec",
    "refer",
    "replicas",
    "mountpoint",
    "mp",
];

/// Check an exports table. On failure returns one message per bad line.
pub fn check_exports(content: &str) -> Result<(), String> {
    let errors: Vec<String> = logical_lines(content)
        .filter_map(|(number, line)| {
            check_line(&line)
                .err()
                .map(|message| format!("line {}: {}", number, message))
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("\n"))
    }
}

/// Non-blank, non-comment lines with `\` continuations joined, numbered from 1.
fn logical_lines(content: &str) -> impl Iterator<Item = (usize, String)> + '_ {
    let mut pending: Option<(usize, String)> = None;
    let mut lines = content.lines().enumerate();

    std::iter::from_fn(move || loop {
        let Some((index, raw)) = lines.next() else {
            let (start, joined) = pending.take()?;
            let trimmed = joined.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            return Some((start, trimmed.to_string()));
        };

        let (start, mut joined) = pending.take().unwrap_or((index + 1, String::new()));
        match raw.strip_suffix('\\') {
            Some(head) => {
                joined.push_str(head);
                joined.push(' ');
                pending = Some((start, joined));
            }
            None => {
                joined.push_str(raw);
                let trimmed = joined.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                return Some((start, trimmed.to_string()));
            }
        }
    })
}

fn check_line(line: &str) -> Result<(), String> {
    let (path, rest) = split_path(line)?;

    if !path.starts_with('/') {
        return Err(format!("export path '{}' is not absolute", path));
    }

    let clients: Vec<&str> = rest.split_whitespace().collect();
    if clients.is_empty() {
        return Err(format!("export '{}' lists no clients", path));
    }

    for client in clients {
        check_client(client)?;
    }

    Ok(())
}

/// Split the leading path, which may be double-quoted, from the client list.
fn split_path(line: &str) -> Result<(&str, &str), String> {
    if let Some(quoted) = line.strip_prefix('"') {
        let end = quoted
            .find('"')
            .ok_or_else(|| "unterminated quoted path".to_string())?;
        return Ok((&quoted[..end], &quoted[end + 1..]));
    }

    Ok(line.split_once(char::is_whitespace).unwrap_or((line, "")))
}

fn check_client(token: &str) -> Result<(), String> {
    // `-opts` sets defaults for the clients that follow.
    if let Some(defaults) = token.strip_prefix('-') {
        return check_options(defaults);
    }

    let (host, options) = match token.split_once('(') {
        Some((host, rest)) => {
            let options = rest
                .strip_suffix(')')
                .ok_or_else(|| format!("unbalanced parentheses in '{}'", token))?;
            (host, Some(options))
        }
        None => (token, None),
    };

    if !host.is_empty() {
        let netgroup = host.strip_prefix('@');
        let host_ok = match netgroup {
            Some(group) => !group.is_empty(),
            None => validate_network(host).is_ok(),
        };
        if !host_ok {
            return Err(format!("invalid client '{}'", host));
        }
    }

    match options {
        Some(options) => check_options(options),
        None => Ok(()),
    }
}

fn check_options(options: &str) -> Result<(), String> {
    let mut seen: Vec<&str> = Vec::new();

    for option in options.split(',') {
        let name = match option.split_once('=') {
            Some((name, value)) => {
                if !VALUE_OPTIONS.contains(&name) {
                    return Err(format!("option '{}' takes no value", name));
                }
                if value.is_empty() {
                    return Err(format!("option '{}' needs a value", name));
                }
                name
            }
            None if FLAG_OPTIONS.contains(&option) => option,
            None if option.is_empty() => return Err("empty export option".to_string()),
            None => return Err(format!("unknown export option '{}'", option)),
        };
        seen.push(name);
    }

    let conflicts = [
        ("rw", "ro"),
        ("sync", "async"),
        ("root_squash", "no_root_squash"),
        ("all_squash", "no_root_squash"),
        ("all_squash", "no_all_squash"),
        ("subtree_check", "no_subtree_check"),
    ];
    for (a, b) in conflicts {
        if seen.contains(&a) && seen.contains(&b) {
            return Err(format!("options '{}' and '{}' conflict", a, b));
        }
    }

    Ok(())
}
