use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// Network address of a gossip node. The canonical `host:port` form is the
/// node's identity everywhere in the graph model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    #[serde(alias = "ip")]
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: i64) -> Result<Self, AddressError> {
        let host = host.into();
        if host.is_empty() {
            return Err(AddressError::EmptyHost);
        }
        let port = u16::try_from(port).map_err(|_| AddressError::PortOutOfRange(port))?;
        Ok(Self { host, port })
    }
}

/// Canonical identity key for an address.
pub fn encode(address: &Address) -> String {
    format!("{}:{}", address.host, address.port)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split on the last colon so bracketless IPv6 hosts keep their colons
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
        let port: i64 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(port.to_string()))?;
        Address::new(host, port)
    }
}
