//! vsftpd record.

use std::path::PathBuf;

use super::profile::{systemctl, ConfigCheck, ReloadStrategy, ServiceProfile, ShareProtocol};

/// vsftpd serves one root directory and only re-reads its file on restart.
pub fn profile() -> ServiceProfile {
    ServiceProfile {
        id: "ftp",
        display_name: "vsftpd FTP Server",
        protocol: ShareProtocol::Ftp,
        unit: "vsftpd".to_string(),
        live_path: PathBuf::from("/etc/vsftpd.conf"),
        template: "vsftpd.conf.tera",
        check: ConfigCheck::KeyValue,
        error_markers: Vec::new(),
        reload_strategy: ReloadStrategy::Restart,
        reload_command: systemctl(&["reload", "{unit}"]),
        max_shares: Some(1),
        default_listen_port: Some(21),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vsftpd_profile() {
        let profile = profile();
        assert_eq!(profile.reload_strategy, ReloadStrategy::Restart);
        assert_eq!(profile.max_shares, Some(1));
        assert_eq!(profile.default_listen_port, Some(21));
    }
}
