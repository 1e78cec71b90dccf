//! Declarative share records supplied by the domain layer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One exportable directory: an SMB share, NFS export, FTP root or HTTP location.
///
/// Owned by the domain layer; the daemon only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSpec {
    /// Share name, unique among the enabled specs of one service.
    pub name: String,
    /// Source directory on the host.
    pub path: PathBuf,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub guest_ok: bool,
    /// Client restriction: addresses, CIDR blocks, host patterns or `*`.
    #[serde(default)]
    pub allowed_networks: Vec<String>,
    /// User names (or `@group`) allowed to connect.
    #[serde(default)]
    pub valid_users: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "default_true")]
    pub browseable: bool,
    #[serde(default)]
    pub nfs: NfsFlags,
}

/// NFS export options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfsFlags {
    #[serde(default)]
    pub root_squash: bool,
    #[serde(default)]
    pub no_root_squash: bool,
    #[serde(default)]
    pub all_squash: bool,
    #[serde(default = "default_true")]
    pub sync: bool,
    #[serde(default)]
    pub subtree_check: bool,
}

impl Default for NfsFlags {
    fn default() -> Self {
        Self {
            root_squash: false,
            no_root_squash: false,
            all_squash: false,
            sync: true,
            subtree_check: false,
        }
    }
}

/// Service-wide options that are not tied to a single share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalOptions {
    /// NetBIOS name for Samba, `server_name` for Nginx.
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub workgroup: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub listen_port: Option<u16>,
    /// Additional global directives, emitted in key order.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl ShareSpec {
    /// Create an enabled, writable share with default flags.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            read_only: false,
            guest_ok: false,
            allowed_networks: Vec::new(),
            valid_users: Vec::new(),
            enabled: true,
            comment: None,
            browseable: true,
            nfs: NfsFlags::default(),
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn guest_ok(mut self, guest_ok: bool) -> Self {
        self.guest_ok = guest_ok;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn allow_network(mut self, network: impl Into<String>) -> Self {
        self.allowed_networks.push(network.into());
        self
    }

    pub fn valid_user(mut self, user: impl Into<String>) -> Self {
        self.valid_users.push(user.into());
        self
    }

    pub fn nfs_flags(mut self, nfs: NfsFlags) -> Self {
        self.nfs = nfs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let spec: ShareSpec =
            serde_json::from_str(r#"{"name": "docs", "path": "/srv/docs"}"#).unwrap();
        assert_eq!(spec, ShareSpec::new("docs", "/srv/docs"));
        assert!(spec.enabled);
        assert!(spec.nfs.sync);
    }

    #[test]
    fn test_deserialize_nfs_flags() {
        let spec: ShareSpec = serde_json::from_str(
            r#"{"name": "data", "path": "/srv/data", "read_only": true,
                "allowed_networks": ["10.0.0.0/8"], "nfs": {"no_root_squash": true}}"#,
        )
        .unwrap();
        assert!(spec.read_only);
        assert!(spec.nfs.no_root_squash);
        assert!(!spec.nfs.root_squash);
        assert_eq!(spec.allowed_networks, vec!["10.0.0.0/8"]);
    }
}
