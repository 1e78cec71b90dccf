//! Nginx service record.

use std::path::PathBuf;

use super::profile::{systemctl, ConfigCheck, ReloadStrategy, ServiceProfile, ShareProtocol};

/// Nginx publishing shares as HTTP directory listings.
pub fn profile() -> ServiceProfile {
    ServiceProfile {
        id: "nginx",
        display_name: "Nginx Web Server",
        protocol: ShareProtocol::Http,
        unit: "nginx".to_string(),
        live_path: PathBuf::from("/etc/nginx/nginx.conf"),
        template: "nginx.conf.tera",
        check: ConfigCheck::Command(vec![
            "nginx".to_string(),
            "-t".to_string(),
            "-q".to_string(),
            "-c".to_string(),
            "{config}".to_string(),
        ]),
        error_markers: vec!["[emerg]".to_string()],
        reload_strategy: ReloadStrategy::Reload,
        reload_command: systemctl(&["reload", "{unit}"]),
        max_shares: None,
        default_listen_port: Some(80),
    }
}
