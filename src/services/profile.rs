//! Service configuration records.
//!
//! Every supported service is described by one `ServiceProfile`: which
//! template renders its live file, how a candidate file is checked, and which
//! commands control the daemon. Adding a service means adding a record, not a
//! new type.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::state::ServiceAction;

/// Placeholder replaced by the candidate file path in check commands.
pub const CONFIG_PLACEHOLDER: &str = "{config}";

/// Placeholder replaced by the unit name in control commands.
pub const UNIT_PLACEHOLDER: &str = "{unit}";

/// Which family of share the service exports; drives flag compatibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareProtocol {
    Smb,
    Nfs,
    Ftp,
    Http,
}

/// How the syntax of a candidate file is verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCheck {
    /// Run the service's own checker; `{config}` is the candidate path.
    Command(Vec<String>),
    /// Parse the file as an `/etc/exports` table.
    Exports,
    /// Parse the file as `key=value` lines (vsftpd).
    KeyValue,
    /// No check available.
    None,
}

/// Whether the service picks up a new file with a reload or needs a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadStrategy {
    Reload,
    Restart,
}

/// Configuration record for one managed service.
#[derive(Debug, Clone)]
pub struct ServiceProfile {
    /// Service identifier (`smb`, `nfs`, `ftp`, `nginx`).
    pub id: &'static str,
    /// Human-readable name.
    pub display_name: &'static str,
    pub protocol: ShareProtocol,
    /// Systemd unit name.
    pub unit: String,
    /// The file the running daemon reads.
    pub live_path: PathBuf,
    /// Template name inside the template engine.
    pub template: &'static str,
    pub check: ConfigCheck,
    /// Output fragments that mark a failed check even when the exit code is 0.
    pub error_markers: Vec<String>,
    pub reload_strategy: ReloadStrategy,
    /// Reload argv; `{unit}` is replaced by the unit name.
    pub reload_command: Vec<String>,
    /// Upper bound on enabled shares, for daemons serving a single root.
    pub max_shares: Option<usize>,
    /// Port used when the global options do not name one.
    pub default_listen_port: Option<u16>,
}

impl ServiceProfile {
    /// Argument vector for a control action.
    pub fn control_argv(&self, action: ServiceAction) -> Vec<String> {
        match action {
            ServiceAction::Reload => self
                .reload_command
                .iter()
                .map(|arg| arg.replace(UNIT_PLACEHOLDER, &self.unit))
                .collect(),
            ServiceAction::Status => systemctl(&["is-active", &self.unit]),
            other => systemctl(&[other.as_str(), &self.unit]),
        }
    }

    /// Argument vector for a command-based syntax check of `candidate`.
    pub fn check_argv(&self, candidate: &str) -> Option<Vec<String>> {
        match &self.check {
            ConfigCheck::Command(argv) => Some(
                argv.iter()
                    .map(|arg| arg.replace(CONFIG_PLACEHOLDER, candidate))
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn with_live_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.live_path = path.into();
        self
    }

    pub fn with_check(mut self, check: ConfigCheck) -> Self {
        self.check = check;
        self
    }
}

/// `systemctl <args>` as an argument vector.
pub(crate) fn systemctl(args: &[&str]) -> Vec<String> {
    std::iter::once("systemctl")
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}
