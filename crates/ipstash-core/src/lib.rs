// # ipstash-core
//
// Core library for ipstash: find the host's public IP and hand it to a
// broker for consumers such as a security-group updater.
//
// ## Architecture Overview
//
// - **IpResolver**: Trait for obtaining and validating the current public IP
// - **Propagator**: Trait for publishing (pub/sub) or recording (bounded
//   history) a validated IP
// - **StashEngine**: Runs one resolve → dry-run gate → propagate cycle
// - **MemoryChannel / MemoryHistory**: In-process backends with broker semantics
//
// ## Design Principles
//
// 1. **Run once**: No polling loop; scheduling belongs to cron or similar
// 2. **Validated values**: An `IpAddress` cannot exist unless it parsed
// 3. **Injected clients**: Broker handles are passed in, never global
// 4. **Typed errors**: Failures propagate to one top-level handler

pub mod config;
pub mod engine;
pub mod error;
pub mod ip;
pub mod memory;
pub mod resolver;
pub mod traits;

// Re-export core types for convenience
pub use config::{PropagationMode, RunConfig};
pub use engine::{RunOutcome, StashEngine};
pub use error::{Error, ErrorKind, Result};
pub use ip::{HistoryEntry, IpAddress};
pub use memory::{MemoryChannel, MemoryHistory};
pub use resolver::FixedIpResolver;
pub use traits::{HistoryLog, IpResolver, Propagation, Propagator};
