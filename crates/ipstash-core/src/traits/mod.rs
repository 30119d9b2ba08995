//! Core traits for ipstash
//!
//! - [`IpResolver`]: Obtain the current public IP
//! - [`Propagator`]: Publish or record a validated IP
//! - [`HistoryLog`]: Read back the bounded history set

pub mod ip_resolver;
pub mod propagator;

pub use ip_resolver::IpResolver;
pub use propagator::{HistoryLog, Propagation, Propagator};
