//! NFS kernel server record.

use std::path::PathBuf;

use super::profile::{ConfigCheck, ReloadStrategy, ServiceProfile, ShareProtocol};

/// NFS server; exports are re-read with `exportfs -ra`.
pub fn profile() -> ServiceProfile {
    ServiceProfile {
        id: "nfs",
        display_name: "NFS Server",
        protocol: ShareProtocol::Nfs,
        unit: "nfs-server".to_string(),
        live_path: PathBuf::from("/etc/exports"),
        template: "exports.tera",
        check: ConfigCheck::Exports,
        error_markers: Vec::new(),
        reload_strategy: ReloadStrategy::Reload,
        reload_command: vec!["exportfs".to_string(), "-ra".to_string()],
        max_shares: None,
        default_listen_port: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceAction;

    #[test]
    fn test_nfs_reload_uses_exportfs() {
        let profile = profile();
        assert_eq!(profile.control_argv(ServiceAction::Reload), vec!["exportfs", "-ra"]);
        assert_eq!(profile.check, ConfigCheck::Exports);
    }
}
