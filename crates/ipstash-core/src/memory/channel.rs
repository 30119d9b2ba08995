use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::ip::IpAddress;
use crate::traits::{Propagation, Propagator};

/// Messages buffered per subscriber before it starts lagging
const SUBSCRIBER_BUFFER: usize = 64;

/// In-memory pub/sub channel
///
/// Delivery follows broker pub/sub: a message reaches the subscribers
/// connected at publish time and is gone otherwise.
///
/// # Example
///
/// ```rust
/// use ipstash_core::memory::MemoryChannel;
/// use ipstash_core::IpAddress;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let channel = MemoryChannel::new("ipstash");
///     let mut rx = channel.subscribe();
///
///     let receivers = channel.publish(&IpAddress::parse("203.0.113.9")?)?;
///     assert_eq!(receivers, 1);
///     assert_eq!(rx.recv().await?, "203.0.113.9");
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    name: String,
    tx: broadcast::Sender<String>,
}

impl MemoryChannel {
    /// Create a channel with no subscribers
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Connect a subscriber
    ///
    /// The subscriber only sees messages published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Number of connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish the IP string, returning how many subscribers received it
    pub fn publish(&self, ip: &IpAddress) -> Result<usize> {
        if self.name.is_empty() {
            return Err(Error::publish_failed(&self.name, "channel name is empty"));
        }

        // `send` only fails when nobody is listening, which is still an
        // acknowledged publish.
        Ok(self.tx.send(ip.to_string()).unwrap_or(0))
    }
}

#[async_trait]
impl Propagator for MemoryChannel {
    async fn propagate(&self, ip: &IpAddress, _observed_at: DateTime<Utc>) -> Result<Propagation> {
        let receivers = self.publish(ip)?;
        Ok(Propagation::Published { receivers })
    }

    fn target(&self) -> &str {
        &self.name
    }

    fn propagator_name(&self) -> &'static str {
        "memory-pubsub"
    }
}
