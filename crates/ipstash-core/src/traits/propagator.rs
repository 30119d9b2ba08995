// # Propagator Trait
//
// Defines how a validated IP leaves the process.
//
// Two variants exist, and they are equally valid designs:
//
// - **Pub/Sub**: publish the IP on a named channel. Live subscribers get it,
//   nobody else does. Every run publishes, even when the IP is unchanged.
// - **Bounded history**: record `(ip, timestamp)` in a sorted set capped at
//   a fixed size, evicting the oldest members. The set is the durable
//   record consumers can audit or roll back from.
//
// ## Implementations
//
// - Redis: `ipstash-redis` crate (`RedisPublisher`, `RedisHistory`)
// - In-process: [`crate::memory::MemoryChannel`], [`crate::memory::MemoryHistory`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ip::{HistoryEntry, IpAddress};

/// Result of a successful propagation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// The broker acknowledged a publish
    Published {
        /// Subscribers the broker delivered to (may be zero)
        receivers: usize,
    },
    /// The history set was updated
    Recorded {
        /// Members in the set after the insert and trim
        len: usize,
        /// Members evicted by the trim
        evicted: usize,
    },
}

/// Trait for propagator implementations
///
/// # Contract
///
/// - `propagate()` returns only once the broker has acknowledged the
///   operation. Subscriber delivery is not part of the acknowledgement.
/// - Broker failures map to [`Error::PublishFailed`](crate::Error::PublishFailed)
///   naming [`Propagator::target`].
/// - No retries and no deduplication against earlier runs.
#[async_trait]
pub trait Propagator: Send + Sync {
    /// Send or record the IP
    ///
    /// # Parameters
    ///
    /// - `ip`: The validated IP
    /// - `observed_at`: When the IP was observed (used as the history score)
    async fn propagate(
        &self,
        ip: &IpAddress,
        observed_at: DateTime<Utc>,
    ) -> Result<Propagation, crate::Error>;

    /// Channel or key name this propagator writes to
    fn target(&self) -> &str;

    /// Propagator name (for logging/debugging)
    fn propagator_name(&self) -> &'static str;
}

/// Read access to a bounded history set
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// All entries, oldest first
    async fn entries(&self) -> Result<Vec<HistoryEntry>, crate::Error>;
}
