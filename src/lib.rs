//! Weakly keyed associative map with deferred scavenging
//!
//! - `map`: `WeakKeyMap`, a lock-serialized map whose keys are held as `Weak<K>`
//! - `reaper`: background thread that purges expired entries with non-blocking lock attempts
//! - `stats`: operation counters exposed as `MapStats` snapshots
//! - `error`: crate error type and `Result` alias

pub mod error;
mod key;
pub mod map;
mod reaper;
pub mod stats;

pub use error::{MapError, Result};
pub use map::{Iter, WeakKeyMap};
pub use stats::MapStats;
