//! Validated IP value types
//!
//! [`IpAddress`] is the only way an IP travels through ipstash. It keeps the
//! exact trimmed text it was built from, so what gets published or recorded
//! string-compares equal to what the endpoint returned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A string guaranteed to be an IPv4 or IPv6 literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpAddress {
    text: String,
    addr: IpAddr,
}

impl IpAddress {
    /// Validate a raw value, trimming surrounding whitespace
    ///
    /// Only bare literals are accepted: no CIDR suffix, no port, no
    /// brackets. On failure the error names the untrimmed input.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let addr = trimmed
            .parse::<IpAddr>()
            .map_err(|_| Error::invalid_ip_format(raw))?;

        Ok(Self {
            text: trimmed.to_string(),
            addr,
        })
    }

    /// The literal as received (trimmed, otherwise untouched)
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The parsed address
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn is_ipv6(&self) -> bool {
        self.addr.is_ipv6()
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for IpAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IpAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<IpAddress> for String {
    fn from(ip: IpAddress) -> Self {
        ip.text
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        Self {
            text: addr.to_string(),
            addr,
        }
    }
}

/// One observation in the bounded history set
///
/// Stored as member (`ip`) and score (`observed_at`, Unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ip: IpAddress,
    pub observed_at: i64,
}

impl HistoryEntry {
    pub fn new(ip: IpAddress, observed_at: i64) -> Self {
        Self { ip, observed_at }
    }

    /// The observation time as a UTC datetime, if representable
    pub fn observed_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.observed_at, 0)
    }
}
