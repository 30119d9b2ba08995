// # Redis Propagators
//
// This crate provides the Redis-backed propagators for ipstash.
//
// ## Wire Contract
//
// - Pub/Sub: `PUBLISH <channel> <ip>`. The reply is the number of
//   subscribers that received the message; zero is a valid reply.
// - Bounded history, one MULTI/EXEC transaction:
//   `ZADD <key> <unix-ts> <ip>`, `ZREMRANGEBYRANK <key> 0 -(max+1)`, `ZCARD <key>`.
//   Insert and trim run as one unit, so overlapping runs can never leave
//   the set above capacity. The trim goes by score, so with skewed clocks
//   between hosts the member just added can itself be the one evicted.
//
// ## Connection Lifecycle
//
// [`RedisBroker`] owns the client handle and is injected into each
// propagator. Every operation opens its own connection and drops it when
// the operation finishes; there is no process-wide connection. Each
// operation is bounded by the broker timeout.
//
// ## Security
//
// The broker URL may carry a password. It never appears in logs, errors,
// or Debug output.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipstash_core::{
    Error, HistoryEntry, HistoryLog, IpAddress, Propagation, Propagator, Result,
};
use tracing::warn;
use std::future::Future;
use std::time::Duration;

/// Default timeout for a broker operation
const DEFAULT_BROKER_TIMEOUT: Duration = Duration::from_secs(10);

/// Redis client handle shared by the propagators of one run
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
    timeout: Duration,
}

// Custom Debug implementation that hides credentials in the URL
impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = self.client.get_connection_info();
        f.debug_struct("RedisBroker")
            .field("addr", &info.addr)
            .field("db", &info.redis.db)
            .field("password", &info.redis.password.as_ref().map(|_| "<REDACTED>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisBroker {
    /// Parse the connection URL with the default timeout
    ///
    /// No connection is made here. A malformed URL is a configuration
    /// error, raised before any run logic executes.
    pub fn open(url: &str) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_BROKER_TIMEOUT)
    }

    /// Parse the connection URL, bounding every operation by `timeout`
    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        // The redis error can echo the URL, password included
        let client = redis::Client::open(url)
            .map_err(|e| Error::config(format!("Invalid broker URL ({:?})", e.kind())))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `op` on a fresh connection, under the broker timeout
    ///
    /// The connection is dropped when `op` completes. Every failure,
    /// connecting included, is reported against `target`.
    async fn execute<T, F, Fut>(&self, target: &str, op: F) -> Result<T>
    where
        F: FnOnce(redis::aio::MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let attempt = async {
            let con = self.client.get_multiplexed_async_connection().await?;
            op(con).await
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::publish_failed(target, e)),
            Err(_) => Err(Error::publish_failed(
                target,
                format!("broker did not answer within {:?}", self.timeout),
            )),
        }
    }
}

/// Publishes the IP on a Redis pub/sub channel
#[derive(Debug, Clone)]
pub struct RedisPublisher {
    broker: RedisBroker,
    channel: String,
}

impl RedisPublisher {
    /// Create a publisher for `channel`
    ///
    /// # Parameters
    ///
    /// - `broker`: Client handle this publisher uses for its whole life
    /// - `channel`: Channel name to publish on
    pub fn new(broker: RedisBroker, channel: impl Into<String>) -> Self {
        Self {
            broker,
            channel: channel.into(),
        }
    }

    /// `PUBLISH <channel> <ip>`, returning the number of receivers
    pub async fn publish(&self, ip: &IpAddress) -> Result<usize> {
        let channel = self.channel.as_str();
        let payload = ip.as_str();

        self.broker
            .execute(channel, |mut con| async move {
                redis::cmd("PUBLISH")
                    .arg(channel)
                    .arg(payload)
                    .query_async(&mut con)
                    .await
            })
            .await
    }
}

#[async_trait]
impl Propagator for RedisPublisher {
    async fn propagate(&self, ip: &IpAddress, _observed_at: DateTime<Utc>) -> Result<Propagation> {
        let receivers = self.publish(ip).await?;
        Ok(Propagation::Published { receivers })
    }

    fn target(&self) -> &str {
        &self.channel
    }

    fn propagator_name(&self) -> &'static str {
        "redis-pubsub"
    }
}

/// Records the IP into a capped Redis sorted set
///
/// Member is the IP string and score the Unix timestamp. Because Redis
/// identifies sorted-set members by value, recording an IP that is
/// already present moves it to the new timestamp rather than adding a
/// second entry.
#[derive(Debug, Clone)]
pub struct RedisHistory {
    broker: RedisBroker,
    key: String,
    max_entries: usize,
}

impl RedisHistory {
    /// Create a history writer for `key`, capped at `max_entries`
    pub fn new(broker: RedisBroker, key: impl Into<String>, max_entries: usize) -> Self {
        Self {
            broker,
            key: key.into(),
            max_entries,
        }
    }

    /// Insert `(ip, now)` and trim to capacity in one transaction
    pub async fn record(&self, ip: &IpAddress, now: i64) -> Result<Propagation> {
        if self.max_entries == 0 {
            return Err(Error::publish_failed(&self.key, "history capacity is zero"));
        }

        let key = self.key.as_str();
        let member = ip.as_str();
        let stop = trim_stop(self.max_entries)?;

        let (evicted, len): (usize, usize) = self
            .broker
            .execute(key, |mut con| async move {
                redis::pipe()
                    .atomic()
                    .cmd("ZADD").arg(key).arg(now).arg(member).ignore()
                    .cmd("ZREMRANGEBYRANK").arg(key).arg(0).arg(stop)
                    .cmd("ZCARD").arg(key)
                    .query_async(&mut con)
                    .await
            })
            .await?;

        if evicted > 0 {
            tracing::debug!("Evicted {} oldest entries from '{}'", evicted, key);
        }

        Ok(Propagation::Recorded { len, evicted })
    }

    /// Number of members in the set
    pub async fn len(&self) -> Result<usize> {
        let key = self.key.as_str();
        self.broker
            .execute(key, |mut con| async move {
                redis::cmd("ZCARD").arg(key).query_async(&mut con).await
            })
            .await
    }
}

/// Last rank to remove so that only the newest `max_entries` members remain
fn trim_stop(max_entries: usize) -> Result<i64> {
    i64::try_from(max_entries)
        .ok()
        .and_then(|max| max.checked_add(1))
        .map(|stop| -stop)
        .ok_or_else(|| Error::config(format!("history capacity {max_entries} is out of range")))
}

/// Turn `ZRANGE ... WITHSCORES` replies into entries, skipping members
/// that are not IP literals
fn decode_entries(key: &str, members: Vec<(String, f64)>) -> Vec<HistoryEntry> {
    members
        .into_iter()
        .filter_map(|(member, score)| match IpAddress::parse(&member) {
            Ok(ip) => Some(HistoryEntry::new(ip, score as i64)),
            Err(_) => {
                warn!("Skipping member {:?} of '{}': not an IP address", member, key);
                None
            }
        })
        .collect()
}

#[async_trait]
impl Propagator for RedisHistory {
    async fn propagate(&self, ip: &IpAddress, observed_at: DateTime<Utc>) -> Result<Propagation> {
        self.record(ip, observed_at.timestamp()).await
    }

    fn target(&self) -> &str {
        &self.key
    }

    fn propagator_name(&self) -> &'static str {
        "redis-history"
    }
}

#[async_trait]
impl HistoryLog for RedisHistory {
    async fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let key = self.key.as_str();
        let members: Vec<(String, f64)> = self
            .broker
            .execute(key, |mut con| async move {
                redis::cmd("ZRANGE")
                    .arg(key)
                    .arg(0)
                    .arg(-1)
                    .arg("WITHSCORES")
                    .query_async(&mut con)
                    .await
            })
            .await?;

        Ok(decode_entries(key, members))
    }
}
