//! Samba service record.

use std::path::PathBuf;

use super::profile::{systemctl, ConfigCheck, ReloadStrategy, ServiceProfile, ShareProtocol};

/// Samba file server (`smbd`).
pub fn profile() -> ServiceProfile {
    ServiceProfile {
        id: "smb",
        display_name: "Samba File Server",
        protocol: ShareProtocol::Smb,
        unit: "smbd".to_string(),
        live_path: PathBuf::from("/etc/samba/smb.conf"),
        template: "smb.conf.tera",
        check: ConfigCheck::Command(vec![
            "testparm".to_string(),
            "-s".to_string(),
            "{config}".to_string(),
        ]),
        error_markers: vec![
            "Unknown parameter encountered".to_string(),
            "Ignoring unknown parameter".to_string(),
            "Error loading services".to_string(),
        ],
        reload_strategy: ReloadStrategy::Reload,
        reload_command: systemctl(&["reload", "{unit}"]),
        max_shares: None,
        default_listen_port: None,
    }
}
