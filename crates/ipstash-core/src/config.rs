//! Run configuration
//!
//! A [`RunConfig`] is resolved once per invocation and treated as read-only
//! afterwards. [`RunConfig::from_lookup`] builds it from any key lookup so
//! the binary can feed it `std::env::var` and tests can feed it a map.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default pub/sub channel name
pub const DEFAULT_CHANNEL: &str = "ipstash";

/// Default key of the bounded history set
pub const DEFAULT_HISTORY_KEY: &str = "ipstash:history";

/// Default capacity of the bounded history set
pub const DEFAULT_HISTORY_MAX: usize = 60;

/// Largest accepted capacity of the bounded history set
pub const MAX_HISTORY_MAX: usize = 100_000;

/// Default timeout for the HTTP fetch and each broker call
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Main run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Endpoint returning the caller's public IP as the whole body
    ///
    /// Optional because a run with an injected IP never fetches.
    pub fetch_url: Option<String>,

    /// Where the IP goes
    pub mode: PropagationMode,

    /// Broker connection string (`redis://...`)
    pub broker_url: String,

    /// Resolve only, skip propagation
    #[serde(default)]
    pub dry_run: bool,

    /// Timeout applied to the fetch and to each broker call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Propagation variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropagationMode {
    /// Publish on a pub/sub channel
    PubSub {
        /// Channel name
        channel: String,
    },

    /// Record into a bounded, timestamp-ordered set
    History {
        /// Sorted set key
        key: String,
        /// Maximum number of members kept
        #[serde(default = "default_history_max")]
        max_entries: usize,
    },
}

impl PropagationMode {
    /// Channel or key name, for logs and errors
    pub fn target(&self) -> &str {
        match self {
            PropagationMode::PubSub { channel } => channel,
            PropagationMode::History { key, .. } => key,
        }
    }

    /// Validate the mode
    pub fn validate(&self) -> Result<()> {
        match self {
            PropagationMode::PubSub { channel } => {
                if channel.trim().is_empty() {
                    return Err(Error::config("IPSTASH_CHANNEL cannot be empty"));
                }
                Ok(())
            }
            PropagationMode::History { key, max_entries } => {
                if key.trim().is_empty() {
                    return Err(Error::config("IPSTASH_HISTORY_KEY cannot be empty"));
                }
                if !(1..=MAX_HISTORY_MAX).contains(max_entries) {
                    return Err(Error::config(format!(
                        "IPSTASH_HISTORY_MAX must be between 1 and {MAX_HISTORY_MAX}. Got: {max_entries}"
                    )));
                }
                Ok(())
            }
        }
    }
}

impl Default for PropagationMode {
    fn default() -> Self {
        PropagationMode::PubSub {
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl RunConfig {
    /// Build a configuration from a key lookup (usually the environment)
    ///
    /// Recognised keys:
    /// - `IP_FETCH_URL`
    /// - `IPSTASH_MODE` (`pubsub` or `history`)
    /// - `IPSTASH_CHANNEL`, `IPSTASH_HISTORY_KEY`, `IPSTASH_HISTORY_MAX`
    /// - `REDIS_URL`, or `REDIS_ADDR` as `host:port`
    /// - `IPSTASH_TIMEOUT_SECS`
    ///
    /// The result is not validated; call [`RunConfig::validate`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode = match get("IPSTASH_MODE").as_deref().unwrap_or("pubsub") {
            "pubsub" | "pub_sub" => PropagationMode::PubSub {
                channel: get("IPSTASH_CHANNEL").unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            },
            "history" => PropagationMode::History {
                key: get("IPSTASH_HISTORY_KEY")
                    .unwrap_or_else(|| DEFAULT_HISTORY_KEY.to_string()),
                max_entries: match get("IPSTASH_HISTORY_MAX") {
                    Some(raw) => raw.parse().map_err(|_| {
                        Error::config(format!("IPSTASH_HISTORY_MAX is not a number: {raw}"))
                    })?,
                    None => DEFAULT_HISTORY_MAX,
                },
            },
            other => {
                return Err(Error::config(format!(
                    "IPSTASH_MODE '{other}' is not supported. Supported modes: pubsub, history"
                )));
            }
        };

        let broker_url = match (get("REDIS_URL"), get("REDIS_ADDR")) {
            (Some(url), _) => url,
            (None, Some(addr)) => format!("redis://{addr}"),
            (None, None) => {
                return Err(Error::config(
                    "REDIS_URL or REDIS_ADDR is required. \
                    Set it via: export REDIS_URL=redis://localhost:6379",
                ));
            }
        };

        let timeout_secs = match get("IPSTASH_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::config(format!("IPSTASH_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            fetch_url: get("IP_FETCH_URL"),
            mode,
            broker_url,
            dry_run: false,
            timeout_secs,
        })
    }

    /// Set the dry-run flag
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the configuration
    ///
    /// The fetch URL is optional here; [`RunConfig::require_fetch_url`]
    /// checks it for runs that actually fetch.
    pub fn validate(&self) -> Result<()> {
        self.mode.validate()?;

        if let Some(url) = &self.fetch_url {
            validate_fetch_url(url)?;
        }

        if !["redis://", "unix://", "redis+unix://"]
            .iter()
            .any(|scheme| self.broker_url.starts_with(scheme))
        {
            return Err(Error::config(format!(
                "broker URL must use the redis:// or unix:// scheme. Got: {}",
                self.broker_url
            )));
        }

        if !(1..=300).contains(&self.timeout_secs) {
            return Err(Error::config(format!(
                "IPSTASH_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.timeout_secs
            )));
        }

        Ok(())
    }

    /// The fetch URL, or a configuration error when it is missing
    pub fn require_fetch_url(&self) -> Result<&str> {
        self.fetch_url
            .as_deref()
            .ok_or_else(|| Error::config("IP_FETCH_URL is required to fetch the public IP"))
    }
}

fn validate_fetch_url(url: &str) -> Result<()> {
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(Error::config(format!(
            "IP_FETCH_URL must use HTTP or HTTPS scheme. Got: {url}"
        )));
    }

    if url.starts_with("http://") {
        tracing::warn!("IP_FETCH_URL uses HTTP (not HTTPS); the fetched IP can be tampered with in transit");
    }

    Ok(())
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_history_max() -> usize {
    DEFAULT_HISTORY_MAX
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_pubsub_defaults() {
        let config = RunConfig::from_lookup(lookup(&[
            ("IP_FETCH_URL", "https://api.ipify.org"),
            ("REDIS_URL", "redis://localhost:6379"),
        ]))
        .unwrap();

        assert_eq!(config.mode, PropagationMode::PubSub { channel: "ipstash".into() });
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(!config.dry_run);
        config.validate().unwrap();
    }

    #[test]
    fn test_history_mode() {
        let config = RunConfig::from_lookup(lookup(&[
            ("IPSTASH_MODE", "history"),
            ("IPSTASH_HISTORY_KEY", "office:ips"),
            ("IPSTASH_HISTORY_MAX", "5"),
            ("REDIS_ADDR", "cache.internal:6380"),
        ]))
        .unwrap();

        assert_eq!(
            config.mode,
            PropagationMode::History { key: "office:ips".into(), max_entries: 5 }
        );
        assert_eq!(config.broker_url, "redis://cache.internal:6380");
        assert_eq!(config.mode.target(), "office:ips");
        config.validate().unwrap();
        assert_eq!(config.require_fetch_url().unwrap_err().kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_redis_url_wins_over_addr() {
        let config = RunConfig::from_lookup(lookup(&[
            ("REDIS_URL", "redis://primary:6379/2"),
            ("REDIS_ADDR", "secondary:6379"),
        ]))
        .unwrap();
        assert_eq!(config.broker_url, "redis://primary:6379/2");
    }

    #[test]
    fn test_missing_broker_is_config_error() {
        let err = RunConfig::from_lookup(lookup(&[("IP_FETCH_URL", "https://x")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = RunConfig::from_lookup(lookup(&[
            ("IPSTASH_MODE", "carrier-pigeon"),
            ("REDIS_URL", "redis://localhost"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));

        let err = RunConfig::from_lookup(lookup(&[
            ("IPSTASH_MODE", "history"),
            ("IPSTASH_HISTORY_MAX", "sixty"),
            ("REDIS_URL", "redis://localhost"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let config = RunConfig::from_lookup(lookup(&[
            ("IPSTASH_MODE", "history"),
            ("IPSTASH_HISTORY_MAX", "0"),
            ("REDIS_URL", "redis://localhost"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());

        let config = RunConfig::from_lookup(lookup(&[
            ("IP_FETCH_URL", "ftp://example.com/ip"),
            ("REDIS_URL", "redis://localhost"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());

        let config = RunConfig::from_lookup(lookup(&[("REDIS_URL", "localhost:6379")])).unwrap();
        assert!(config.validate().is_err());

        let config = RunConfig::from_lookup(lookup(&[
            ("REDIS_URL", "redis://localhost"),
            ("IPSTASH_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_capacity_upper_bound() {
        let history = |max: &str| {
            RunConfig::from_lookup(lookup(&[
                ("IPSTASH_MODE", "history"),
                ("IPSTASH_HISTORY_MAX", max),
                ("REDIS_URL", "redis://localhost"),
            ]))
            .unwrap()
        };

        history("100000").validate().unwrap();

        for max in ["100001", "9223372036854775807", "9223372036854775808"] {
            let err = history(max).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigInvalid, "accepted {max}");
            assert!(err.to_string().contains(max));
        }
    }

    #[test]
    fn test_deserialize_from_json() {
        let config: RunConfig = serde_json::from_str(
            r#"{
                "fetch_url": "https://api.ipify.org",
                "mode": { "type": "history", "key": "ips" },
                "broker_url": "redis://localhost:6379"
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.mode,
            PropagationMode::History { key: "ips".into(), max_entries: DEFAULT_HISTORY_MAX }
        );
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(!config.dry_run);
    }
}
