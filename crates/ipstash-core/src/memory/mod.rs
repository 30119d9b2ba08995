// # In-Memory Backends
//
// Process-local implementations of the two propagator variants.
//
// ## Purpose
//
// They mirror the broker semantics ipstash relies on (pub/sub delivery only
// to connected subscribers, sorted-set member identity and rank trimming)
// without a network. Useful for testing and for embedding ipstash where the
// consumer lives in the same process.
//
// ## Crash Behavior
//
// Everything is lost when the process exits.

pub mod channel;
pub mod history;

pub use channel::MemoryChannel;
pub use history::MemoryHistory;
