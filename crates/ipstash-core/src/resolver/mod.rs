// # Resolver Implementations
//
// The HTTP resolver lives in `ipstash-ip-http`. This module holds the
// resolver that needs no network at all.

use async_trait::async_trait;

use crate::error::Result;
use crate::ip::IpAddress;
use crate::traits::IpResolver;

/// Resolver that returns an operator-supplied literal
///
/// Used by `ipstash test --ip ...` to check broker connectivity without a
/// live fetch, and by tests that need a controlled IP.
#[derive(Debug, Clone)]
pub struct FixedIpResolver {
    ip: IpAddress,
}

impl FixedIpResolver {
    /// Validate `raw` the same way a fetched body is validated
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(Self {
            ip: IpAddress::parse(raw)?,
        })
    }

    pub fn new(ip: IpAddress) -> Self {
        Self { ip }
    }
}

#[async_trait]
impl IpResolver for FixedIpResolver {
    async fn resolve(&self) -> Result<IpAddress> {
        Ok(self.ip.clone())
    }

    fn resolver_name(&self) -> &'static str {
        "fixed"
    }
}
