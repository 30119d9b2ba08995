//! Run-once engine
//!
//! The StashEngine is responsible for:
//! - Resolving the current public IP via an IpResolver
//! - Honouring the dry-run gate
//! - Handing the IP to a Propagator
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ IpResolver  │─── IpAddress ───┐
//! └─────────────┘                 │
//!                                 ▼
//!                        ┌──────────────┐   dry run
//!                        │ StashEngine  │──────────────► notice, done
//!                        └──────────────┘
//!                                 │
//!                                 ▼
//!                        ┌──────────────┐
//!                        │  Propagator  │  PUBLISH / ZADD + trim
//!                        └──────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Resolve the IP (fetch + validate, or injected literal)
//! 2. If dry run, log the IP and stop successfully
//! 3. Propagate, stamped with the observation time
//!
//! There is no loop. An external scheduler invokes one run at a time, and
//! any error ends the run without partial propagation.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::ip::IpAddress;
use crate::traits::{IpResolver, Propagation, Propagator};

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Dry run: the IP was resolved and nothing was propagated
    DryRun { ip: IpAddress },

    /// The IP was propagated
    Propagated {
        ip: IpAddress,
        target: String,
        propagation: Propagation,
    },
}

impl RunOutcome {
    /// The resolved IP
    pub fn ip(&self) -> &IpAddress {
        match self {
            RunOutcome::DryRun { ip } | RunOutcome::Propagated { ip, .. } => ip,
        }
    }
}

/// Core ipstash engine
///
/// Owns its resolver and propagator for the lifetime of one run. The
/// propagator carries the broker client it was built with, so nothing is
/// shared process-wide.
pub struct StashEngine {
    /// Where the IP comes from
    resolver: Box<dyn IpResolver>,

    /// Where the IP goes
    propagator: Box<dyn Propagator>,

    /// Skip propagation
    dry_run: bool,
}

impl StashEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: IP resolver implementation
    /// - `propagator`: Propagator implementation
    /// - `dry_run`: When set, `run_once` never calls the propagator
    pub fn new(
        resolver: Box<dyn IpResolver>,
        propagator: Box<dyn Propagator>,
        dry_run: bool,
    ) -> Self {
        Self {
            resolver,
            propagator,
            dry_run,
        }
    }

    /// Run one detect-and-propagate cycle, timestamped now
    pub async fn run_once(&self) -> Result<RunOutcome> {
        self.run_once_at(Utc::now()).await
    }

    /// Run one cycle with an explicit observation time
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<RunOutcome> {
        debug!("Resolving IP via {}", self.resolver.resolver_name());
        let ip = self.resolver.resolve().await?;

        if self.dry_run {
            info!(
                "Dry run: IP address {} would be sent to '{}'",
                ip,
                self.propagator.target()
            );
            return Ok(RunOutcome::DryRun { ip });
        }

        let propagation = self.propagator.propagate(&ip, now).await?;

        match propagation {
            Propagation::Published { receivers } => {
                info!(
                    "IP address {} published to '{}' channel ({} subscriber(s))",
                    ip,
                    self.propagator.target(),
                    receivers
                );
            }
            Propagation::Recorded { len, evicted } => {
                info!(
                    "IP address {} recorded in '{}' ({} entries, {} evicted)",
                    ip,
                    self.propagator.target(),
                    len,
                    evicted
                );
            }
        }

        Ok(RunOutcome::Propagated {
            ip,
            target: self.propagator.target().to_string(),
            propagation,
        })
    }
}
