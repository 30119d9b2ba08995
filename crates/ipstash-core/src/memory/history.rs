use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::ip::{HistoryEntry, IpAddress};
use crate::traits::{HistoryLog, Propagation, Propagator};

#[derive(Debug, Default)]
struct SortedSet {
    /// (score, member), ordered the way a sorted set ranks them
    ranked: BTreeSet<(i64, String)>,
    scores: HashMap<String, i64>,
}

/// In-memory bounded history
///
/// Follows sorted-set semantics: the member is the IP string, so recording
/// an IP already present moves it to the new timestamp instead of adding a
/// second entry. Insert and trim happen under one lock.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    key: String,
    max_entries: usize,
    inner: Arc<Mutex<SortedSet>>,
}

impl MemoryHistory {
    /// Create an empty history capped at `max_entries`
    pub fn new(key: impl Into<String>, max_entries: usize) -> Self {
        Self {
            key: key.into(),
            max_entries,
            inner: Arc::new(Mutex::new(SortedSet::default())),
        }
    }

    /// Insert `(ip, now)` and trim to capacity
    pub async fn record(&self, ip: &IpAddress, now: i64) -> Result<Propagation> {
        if self.max_entries == 0 {
            return Err(Error::publish_failed(&self.key, "history capacity is zero"));
        }

        let mut set = self.inner.lock().await;
        let member = ip.as_str().to_string();

        if let Some(previous) = set.scores.insert(member.clone(), now) {
            set.ranked.remove(&(previous, member.clone()));
        }
        set.ranked.insert((now, member));

        let mut evicted = 0;
        while set.ranked.len() > self.max_entries {
            if let Some((_, oldest)) = set.ranked.pop_first() {
                set.scores.remove(&oldest);
                evicted += 1;
            }
        }

        Ok(Propagation::Recorded {
            len: set.ranked.len(),
            evicted,
        })
    }

    /// Number of members
    pub async fn len(&self) -> usize {
        self.inner.lock().await.ranked.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.ranked.is_empty()
    }
}

#[async_trait]
impl Propagator for MemoryHistory {
    async fn propagate(&self, ip: &IpAddress, observed_at: DateTime<Utc>) -> Result<Propagation> {
        self.record(ip, observed_at.timestamp()).await
    }

    fn target(&self) -> &str {
        &self.key
    }

    fn propagator_name(&self) -> &'static str {
        "memory-history"
    }
}

#[async_trait]
impl HistoryLog for MemoryHistory {
    async fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let set = self.inner.lock().await;
        set.ranked
            .iter()
            .map(|(score, member)| Ok(HistoryEntry::new(IpAddress::parse(member)?, *score)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(raw: &str) -> IpAddress {
        IpAddress::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let history = MemoryHistory::new("ipstash:history", 60);

        let outcome = history.record(&ip("2001:DB8::7"), 1_700_000_000).await.unwrap();
        assert_eq!(outcome, Propagation::Recorded { len: 1, evicted: 0 });

        let entries = history.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip.as_str(), "2001:DB8::7");
        assert_eq!(entries[0].observed_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_evicts_oldest_beyond_capacity() {
        let history = MemoryHistory::new("ipstash:history", 3);

        for (i, raw) in ["10.0.0.1", "10.0.0.2", "10.0.0.3"].iter().enumerate() {
            history.record(&ip(raw), 100 + i as i64).await.unwrap();
        }
        let outcome = history.record(&ip("10.0.0.4"), 200).await.unwrap();
        assert_eq!(outcome, Propagation::Recorded { len: 3, evicted: 1 });

        let members: Vec<String> = history
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.ip.to_string())
            .collect();
        assert_eq!(members, ["10.0.0.2", "10.0.0.3", "10.0.0.4"]);
    }

    #[tokio::test]
    async fn test_repeated_ip_moves_to_newest_score() {
        let history = MemoryHistory::new("ipstash:history", 60);

        history.record(&ip("10.0.0.1"), 100).await.unwrap();
        history.record(&ip("10.0.0.2"), 101).await.unwrap();
        let outcome = history.record(&ip("10.0.0.1"), 102).await.unwrap();
        assert_eq!(outcome, Propagation::Recorded { len: 2, evicted: 0 });

        let entries = history.entries().await.unwrap();
        assert_eq!(entries[0], HistoryEntry::new(ip("10.0.0.2"), 101));
        assert_eq!(entries[1], HistoryEntry::new(ip("10.0.0.1"), 102));
    }

    #[tokio::test]
    async fn test_concurrent_records_never_exceed_capacity() {
        let history = MemoryHistory::new("ipstash:history", 5);

        let handles: Vec<_> = (0..20u8)
            .map(|i| {
                let history = history.clone();
                tokio::spawn(async move {
                    let addr = IpAddress::from(std::net::IpAddr::from([10, 0, 1, i]));
                    history.record(&addr, i64::from(i)).await.unwrap()
                })
            })
            .collect();

        for handle in handles {
            match handle.await.unwrap() {
                Propagation::Recorded { len, .. } => assert!(len <= 5),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(history.len().await, 5);
    }
}
