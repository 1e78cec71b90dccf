//! Share spec to configuration text.
//!
//! The renderer checks every enabled spec, flattens it into a view the
//! templates can print without further logic, and renders the service's
//! template. It never touches the filesystem or the service.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::error::{DaemonError, ServiceErrorKind};
use crate::services::{ServiceProfile, ShareProtocol};
use crate::shares::{GlobalOptions, RenderedConfig, ShareSpec};
use crate::validation::{
    validate_directive_key, validate_directive_value, validate_network, validate_nginx_value,
    validate_share_name, validate_share_path, validate_share_user,
};

use super::TemplateEngine;

/// Share name reported for failures in the global options.
const GLOBAL_SECTION: &str = "<global>";

const DEFAULT_WORKGROUP: &str = "WORKGROUP";
const DEFAULT_SERVER_STRING: &str = "share-daemon file server";

/// Renders share specs into configuration file content.
#[derive(Clone)]
pub struct Renderer {
    engine: TemplateEngine,
}

#[derive(Serialize)]
struct RenderContext<'a> {
    service: &'a str,
    shares: Vec<ShareView>,
    /// First enabled share, for daemons serving a single root.
    primary: Option<ShareView>,
    options: OptionsView,
}

#[derive(Debug, Clone, Serialize)]
struct ShareView {
    name: String,
    path: String,
    /// Path as an `/etc/exports` token, quoted when it contains whitespace.
    quoted_path: String,
    /// Path with exactly one trailing slash, for location aliases.
    dir_path: String,
    read_only: bool,
    guest_ok: bool,
    browseable: bool,
    comment: Option<String>,
    valid_users: Vec<String>,
    /// Client restrictions; empty means unrestricted.
    networks: Vec<String>,
    /// `client(options)` tokens for the exports table.
    nfs_clients: Vec<String>,
}

#[derive(Serialize)]
struct OptionsView {
    server_name: Option<String>,
    http_server_name: String,
    workgroup: String,
    server_string: String,
    description: Option<String>,
    listen_port: u16,
    extra: Vec<Directive>,
}

#[derive(Serialize)]
struct Directive {
    key: String,
    value: String,
}

impl Renderer {
    pub fn new(engine: TemplateEngine) -> Self {
        Self { engine }
    }

    /// Render the configuration for `profile` from `specs`.
    ///
    /// Disabled specs are skipped. Shares keep their input order, and the
    /// same input always yields byte-identical content.
    pub fn render(
        &self,
        profile: &ServiceProfile,
        specs: &[ShareSpec],
        options: &GlobalOptions,
    ) -> Result<RenderedConfig, DaemonError> {
        let enabled: Vec<&ShareSpec> = specs.iter().filter(|s| s.enabled).collect();

        check_specs(profile, &enabled)?;
        check_options(profile.protocol, options)?;

        let shares: Vec<ShareView> = enabled
            .iter()
            .map(|spec| ShareView::build(profile.protocol, spec))
            .collect();

        let context = RenderContext {
            service: profile.id,
            primary: shares.first().cloned(),
            shares,
            options: OptionsView::build(profile, options),
        };

        let content = self.engine.render(profile.template, &context)?;

        debug!(
            service = profile.id,
            shares = enabled.len(),
            skipped = specs.len() - enabled.len(),
            bytes = content.len(),
            "Rendered configuration"
        );

        Ok(RenderedConfig::new(
            profile.id,
            content,
            enabled.into_iter().cloned().collect(),
        ))
    }
}

fn check_specs(profile: &ServiceProfile, enabled: &[&ShareSpec]) -> Result<(), DaemonError> {
    if let Some(max) = profile.max_shares {
        if enabled.len() > max {
            return Err(invalid_spec(
                &enabled[max].name,
                format!(
                    "{} serves at most {} share(s), {} are enabled",
                    profile.display_name,
                    max,
                    enabled.len()
                ),
            ));
        }
    }

    let mut seen = HashSet::new();
    for spec in enabled {
        check_spec(profile.protocol, spec)?;

        // Samba compares section names case-insensitively; apply that everywhere.
        if !seen.insert(spec.name.to_ascii_lowercase()) {
            return Err(invalid_spec(&spec.name, "duplicate share name"));
        }
    }

    Ok(())
}

fn check_spec(protocol: ShareProtocol, spec: &ShareSpec) -> Result<(), DaemonError> {
    let name = spec.name.as_str();

    validate_share_name(name).map_err(|e| field_error(name, e))?;

    if spec.path.as_os_str().is_empty() {
        return Err(invalid_spec(name, "source path is empty"));
    }
    validate_share_path(&spec.path).map_err(|e| field_error(name, e))?;

    for network in &spec.allowed_networks {
        validate_network(network).map_err(|e| field_error(name, e))?;
    }
    for user in &spec.valid_users {
        validate_share_user(user).map_err(|e| field_error(name, e))?;
    }
    if let Some(comment) = &spec.comment {
        validate_directive_value("comment", comment).map_err(|e| field_error(name, e))?;
    }

    let nfs = &spec.nfs;
    match protocol {
        ShareProtocol::Nfs => {
            if nfs.root_squash && nfs.no_root_squash {
                return Err(invalid_spec(name, "root_squash conflicts with no_root_squash"));
            }
            if nfs.all_squash && nfs.no_root_squash {
                return Err(invalid_spec(name, "all_squash conflicts with no_root_squash"));
            }
            if !spec.valid_users.is_empty() {
                return Err(invalid_spec(name, "NFS exports cannot restrict by user"));
            }
        }
        ShareProtocol::Smb => {
            if spec.guest_ok && !spec.valid_users.is_empty() {
                return Err(invalid_spec(name, "guest_ok conflicts with valid_users"));
            }
        }
        ShareProtocol::Ftp => {
            if !spec.valid_users.is_empty() {
                return Err(invalid_spec(name, "FTP roots cannot restrict by user"));
            }
            if !spec.allowed_networks.is_empty() {
                return Err(invalid_spec(name, "FTP roots cannot restrict by network"));
            }
        }
        ShareProtocol::Http => {
            if !spec.valid_users.is_empty() {
                return Err(invalid_spec(name, "HTTP shares cannot restrict by user"));
            }
        }
    }

    Ok(())
}

fn check_options(protocol: ShareProtocol, options: &GlobalOptions) -> Result<(), DaemonError> {
    let check_value = |param: &str, value: &str| {
        match protocol {
            ShareProtocol::Http => validate_nginx_value(param, value),
            _ => validate_directive_value(param, value),
        }
        .map_err(|e| field_error(GLOBAL_SECTION, e))
    };

    let named = [
        ("server_name", &options.server_name),
        ("workgroup", &options.workgroup),
        ("description", &options.description),
    ];
    for (param, value) in named {
        if let Some(value) = value {
            check_value(param, value)?;
        }
    }

    if options.listen_port == Some(0) {
        return Err(invalid_spec(GLOBAL_SECTION, "listen_port must be non-zero"));
    }

    for (key, value) in &options.extra {
        validate_directive_key(key).map_err(|e| field_error(GLOBAL_SECTION, e))?;
        check_value(key, value)?;
    }

    Ok(())
}

impl ShareView {
    fn build(protocol: ShareProtocol, spec: &ShareSpec) -> Self {
        let raw = spec.path.to_string_lossy();
        let path = match raw.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };
        let quoted_path = if path.chars().any(char::is_whitespace) {
            format!("\"{}\"", path)
        } else {
            path.clone()
        };
        let dir_path = format!("{}/", path.trim_end_matches('/'));

        // `*` lifts the restriction for SMB and HTTP; NFS prints it as a client.
        let networks = if spec.allowed_networks.iter().any(|n| n == "*") {
            Vec::new()
        } else {
            spec.allowed_networks.clone()
        };

        let nfs_clients = if protocol == ShareProtocol::Nfs {
            nfs_clients(spec)
        } else {
            Vec::new()
        };

        Self {
            name: spec.name.clone(),
            path,
            quoted_path,
            dir_path,
            read_only: spec.read_only,
            guest_ok: spec.guest_ok,
            browseable: spec.browseable,
            comment: spec.comment.clone(),
            valid_users: spec.valid_users.clone(),
            networks,
            nfs_clients,
        }
    }
}

fn nfs_clients(spec: &ShareSpec) -> Vec<String> {
    let nfs = &spec.nfs;
    let mut opts = vec![
        if spec.read_only { "ro" } else { "rw" },
        if nfs.sync { "sync" } else { "async" },
        if nfs.subtree_check {
            "subtree_check"
        } else {
            "no_subtree_check"
        },
    ];
    if nfs.root_squash {
        opts.push("root_squash");
    }
    if nfs.no_root_squash {
        opts.push("no_root_squash");
    }
    if nfs.all_squash {
        opts.push("all_squash");
    }
    let opts = opts.join(",");

    if spec.allowed_networks.is_empty() {
        return vec![format!("*({})", opts)];
    }
    spec.allowed_networks
        .iter()
        .map(|network| format!("{}({})", network, opts))
        .collect()
}

impl OptionsView {
    fn build(profile: &ServiceProfile, options: &GlobalOptions) -> Self {
        Self {
            server_name: options.server_name.clone(),
            http_server_name: options.server_name.clone().unwrap_or_else(|| "_".to_string()),
            workgroup: options
                .workgroup
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKGROUP.to_string()),
            server_string: options
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVER_STRING.to_string()),
            description: options.description.clone(),
            listen_port: options
                .listen_port
                .or(profile.default_listen_port)
                .unwrap_or_default(),
            extra: options
                .extra
                .iter()
                .map(|(key, value)| Directive {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

fn invalid_spec(share: &str, reason: impl Into<String>) -> DaemonError {
    DaemonError::service(ServiceErrorKind::InvalidSpec {
        share: share.to_string(),
        reason: reason.into(),
    })
}

/// Re-labels a field validator failure as an invalid spec for `share`.
fn field_error(share: &str, error: DaemonError) -> DaemonError {
    match error {
        DaemonError::Validation { kind } => invalid_spec(share, kind.to_string()),
        other => other,
    }
}
