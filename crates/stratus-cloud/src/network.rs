//! IPv4 address range derivation for network segments
//!
//! Providers such as Azure classic networks only expose a CIDR prefix; the
//! usable range and gateway are computed from it locally.

use crate::error::{CloudError, Result};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Addresses at the start of a segment reserved by the provider
const RESERVED_HEAD: u32 = 4;

/// Longest prefix that still leaves a usable range after reservations
const MAX_PREFIX_LEN: u8 = 29;

/// Parsed address prefix of a network segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPrefix {
    net: Ipv4Net,
}

impl AddressPrefix {
    /// Parse and validate a CIDR such as `10.0.0.0/24`
    pub fn parse(prefix: &str) -> Result<Self> {
        let net: Ipv4Net = prefix
            .trim()
            .parse()
            .map_err(|e| CloudError::InternalError(format!("invalid address prefix {prefix}: {e}")))?;

        if net.prefix_len() > MAX_PREFIX_LEN {
            return Err(CloudError::InternalError(format!(
                "address prefix {prefix} leaves no usable range"
            )));
        }

        Ok(Self { net: net.trunc() })
    }

    /// First assignable address: network address + 4
    pub fn ip_start(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.net.network()) + RESERVED_HEAD)
    }

    /// Last assignable address: broadcast - 1
    pub fn ip_end(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.net.broadcast()) - 1)
    }

    /// Gateway sits on the last assignable address
    pub fn gateway(&self) -> Ipv4Addr {
        self.ip_end()
    }

    pub fn mask_len(&self) -> u8 {
        self.net.prefix_len()
    }
}

impl std::fmt::Display for AddressPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_slash_24_range() {
        let prefix = AddressPrefix::parse("10.0.0.0/24").unwrap();
        assert_eq!(prefix.ip_start().to_string(), "10.0.0.4");
        assert_eq!(prefix.ip_end().to_string(), "10.0.0.254");
        assert_eq!(prefix.gateway().to_string(), "10.0.0.254");
        assert_eq!(prefix.mask_len(), 24);
    }

    #[test]
    fn test_host_bits_are_truncated() {
        let prefix = AddressPrefix::parse("172.16.5.77/20").unwrap();
        assert_eq!(prefix.ip_start().to_string(), "172.16.0.4");
        assert_eq!(prefix.ip_end().to_string(), "172.16.15.254");
        assert_eq!(prefix.to_string(), "172.16.0.0/20");
    }

    #[test]
    fn test_smallest_prefix() {
        let prefix = AddressPrefix::parse("192.168.1.8/29").unwrap();
        assert_eq!(prefix.ip_start().to_string(), "192.168.1.12");
        assert_eq!(prefix.ip_end().to_string(), "192.168.1.14");
    }

    #[test]
    fn test_rejects_garbage_and_tiny_prefixes() {
        assert_eq!(
            AddressPrefix::parse("not-a-cidr").unwrap_err().kind(),
            ErrorKind::InternalError
        );
        assert!(AddressPrefix::parse("10.0.0.0/30").is_err());
        assert!(AddressPrefix::parse("10.0.0.1").is_err());
    }
}
