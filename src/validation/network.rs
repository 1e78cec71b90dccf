//! Client network validation for host-based access lists.

use std::net::IpAddr;

use crate::error::{DaemonError, ValidationErrorKind};

/// Maximum length of a DNS name.
const MAX_HOSTNAME_LENGTH: usize = 253;

/// Validate a client specification.
///
/// Accepts `*`, a single IPv4/IPv6 address, a CIDR block (`10.0.0.0/8`,
/// `fd00::/64`) or a host name pattern made of letters, digits, `-`, `.`
/// and `*` wildcards (`*.lan`).
pub fn validate_network(network: &str) -> Result<(), DaemonError> {
    let invalid = || DaemonError::Validation {
        kind: ValidationErrorKind::InvalidNetwork {
            network: network.to_string(),
        },
    };

    if network == "*" {
        return Ok(());
    }

    if let Some((addr, prefix)) = network.split_once('/') {
        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(invalid());
        }
        return Ok(());
    }

    if network.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let is_host_pattern = !network.is_empty()
        && network.len() <= MAX_HOSTNAME_LENGTH
        && !network.starts_with('-')
        && !network.starts_with('.')
        && network
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '*');

    if is_host_pattern {
        Ok(())
    } else {
        Err(invalid())
    }
}
