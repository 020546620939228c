//! Shareclip Core - peer-to-peer clipboard and file transfer library
//!
//! This library provides the core functionality for exchanging clipboard
//! contents and file drops between two hosts over a direct TCP
//! connection, with mDNS discovery for resolving partner addresses.

pub mod clipboard;
pub mod discovery;
pub mod host;
pub mod protocol;
pub mod sync;
pub mod transfer;

mod error;

pub use error::{Error, Result};

use std::net::SocketAddr;
use std::time::Duration;

use protocol::constants::{DEFAULT_PING_PERIOD, DEFAULT_PORT};

/// Device identity advertised via discovery
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub id: uuid::Uuid,
    pub name: String,
}

impl DeviceIdentity {
    /// Create a new identity with a generated id
    pub fn new(name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name,
        }
    }
}

/// Configuration for the shareclip roles
#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint the data server listens on
    pub host_address: SocketAddr,
    /// Remote endpoint (`host:port`) or discovery handle (`<id>`)
    pub partner_address: String,
    /// Reserved: parsed from configuration but never applied to the wire
    pub compression_level: u32,
    /// Period between keep-alive pings
    pub ping_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            partner_address: String::new(),
            compression_level: 0,
            ping_period: DEFAULT_PING_PERIOD,
        }
    }
}

/// A parsed partner address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartnerAddress {
    /// Direct `host:port` endpoint
    Endpoint(String),
    /// Discovery handle to resolve through [`host::AddressDiscovery`]
    DiscoveryId(String),
}

impl PartnerAddress {
    /// Parse a partner address string.
    ///
    /// `<id>` is a discovery handle; a handle with an explicit port
    /// (`<id>:5555`) is an [`Error::InvalidConfiguration`]. Anything else
    /// must be a `host:port` endpoint.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::InvalidConfiguration("partner address is empty".to_string()));
        }

        if let Some(rest) = address.strip_prefix('<') {
            return match rest.split_once('>') {
                Some((id, "")) if !id.is_empty() => Ok(Self::DiscoveryId(id.to_string())),
                Some((_, tail)) if tail.starts_with(':') => Err(Error::InvalidConfiguration(
                    format!("discovery id {:?} must not carry an explicit port", address),
                )),
                _ => Err(Error::InvalidConfiguration(format!(
                    "malformed discovery handle {:?}",
                    address
                ))),
            };
        }

        if !address.contains(':') {
            return Err(Error::InvalidConfiguration(format!(
                "partner address {:?} is missing a port",
                address
            )));
        }
        Ok(Self::Endpoint(address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            PartnerAddress::parse("192.168.1.5:53512").unwrap(),
            PartnerAddress::Endpoint("192.168.1.5:53512".to_string())
        );
        assert_eq!(
            PartnerAddress::parse("desk.local:53512").unwrap(),
            PartnerAddress::Endpoint("desk.local:53512".to_string())
        );
    }

    #[test]
    fn test_parse_discovery_handle() {
        assert_eq!(
            PartnerAddress::parse("<office-pc>").unwrap(),
            PartnerAddress::DiscoveryId("office-pc".to_string())
        );
    }

    #[test]
    fn test_discovery_handle_with_port_rejected() {
        assert!(matches!(
            PartnerAddress::parse("<office-pc>:5555"),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_addresses_rejected() {
        assert!(PartnerAddress::parse("").is_err());
        assert!(PartnerAddress::parse("no-port").is_err());
        assert!(PartnerAddress::parse("<>").is_err());
    }
}
