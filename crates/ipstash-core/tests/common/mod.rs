//! Test doubles and common utilities for contract tests
//!
//! Minimal doubles that count calls or fail on demand, so the tests can
//! check what the engine does and does not touch.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipstash_core::error::{Error, Result};
use ipstash_core::{IpAddress, IpResolver, Propagation, Propagator};
use std::sync::Arc;

/// A resolver that always fails with the given error factory
pub struct FailingResolver {
    make_error: fn() -> Error,
}

impl FailingResolver {
    pub fn new(make_error: fn() -> Error) -> Self {
        Self { make_error }
    }

    /// Fails like an unreachable fetch endpoint
    pub fn unreachable() -> Self {
        Self::new(|| Error::fetch_failed("http://127.0.0.1:9/ip", "connection refused"))
    }

    /// Fails like an endpoint returning garbage
    pub fn garbage() -> Self {
        Self::new(|| Error::invalid_ip_format("<html>oops</html>"))
    }
}

#[async_trait]
impl IpResolver for FailingResolver {
    async fn resolve(&self) -> Result<IpAddress> {
        Err((self.make_error)())
    }

    fn resolver_name(&self) -> &'static str {
        "failing"
    }
}

/// A propagator that records every IP it is handed
#[derive(Clone)]
pub struct CountingPropagator {
    calls: Arc<std::sync::Mutex<Vec<(String, i64)>>>,
    fail: bool,
}

impl CountingPropagator {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(std::sync::Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A propagator whose broker always rejects the operation
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, i64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Propagator for CountingPropagator {
    async fn propagate(&self, ip: &IpAddress, observed_at: DateTime<Utc>) -> Result<Propagation> {
        self.calls
            .lock()
            .unwrap()
            .push((ip.to_string(), observed_at.timestamp()));

        if self.fail {
            return Err(Error::publish_failed(self.target(), "connection reset by peer"));
        }
        Ok(Propagation::Published { receivers: 0 })
    }

    fn target(&self) -> &str {
        "counting"
    }

    fn propagator_name(&self) -> &'static str {
        "counting"
    }
}

pub fn ip(raw: &str) -> IpAddress {
    IpAddress::parse(raw).expect("valid test IP")
}
