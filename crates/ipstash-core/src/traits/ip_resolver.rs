// # IP Resolver Trait
//
// Defines how ipstash obtains the host's current public IP.
//
// ## Implementations
//
// - HTTP endpoint: `ipstash-ip-http` crate
// - Operator-supplied literal: [`crate::resolver::FixedIpResolver`]
//
// ## Usage
//
// ```rust,ignore
// use ipstash_core::IpResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* IpResolver implementation */;
//
//     let ip = resolver.resolve().await?;
//     println!("public IP: {ip}");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::ip::IpAddress;

/// Trait for IP resolver implementations
///
/// A resolver is a leaf component: it depends on nothing else in ipstash
/// and its output feeds the [`Propagator`](crate::traits::Propagator).
///
/// # Contract
///
/// - Transport failures map to [`Error::FetchFailed`](crate::Error::FetchFailed)
///   and no parsing is attempted.
/// - A value that is not a bare IPv4/IPv6 literal after trimming maps to
///   [`Error::InvalidIpFormat`](crate::Error::InvalidIpFormat), carrying the raw value.
/// - Every network resource acquired by `resolve()` is released before it
///   returns, on success and on failure.
/// - No retries. A failed run is retried by the scheduler, not here.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Obtain and validate the current public IP
    async fn resolve(&self) -> Result<IpAddress, crate::Error>;

    /// Resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}
