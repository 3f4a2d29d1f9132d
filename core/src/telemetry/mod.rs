//! telemetry/mod.rs
//! Counters, stage timers, and the immutable snapshot returned by a run.

pub mod counters;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use timers::*;
pub use snapshot::*;
