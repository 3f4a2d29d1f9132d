//! telemetry/counters.rs
//! Mutable counters used by the pipeline stages.
//!
//! Each stage owns its own `TelemetryCounters` and hands it back when it
//! exits; the controller merges them into one snapshot.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub items_produced: u64,
    pub items_transformed: u64,
    pub items_skipped: u64,
    pub items_committed: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub transform_retries: u64,
    pub idle_waits: u64,
}

impl TelemetryCounters {
    /// One item pulled from the source.
    pub fn add_produced(&mut self, payload_len: usize) {
        self.items_produced += 1;
        self.bytes_in += payload_len as u64;
    }

    /// One item XOR-ed by a worker.
    pub fn add_transformed(&mut self) {
        self.items_transformed += 1;
    }

    /// One item replaced by a skip marker.
    pub fn add_skipped(&mut self) {
        self.items_skipped += 1;
    }

    /// One item written to the sink.
    pub fn add_committed(&mut self, payload_len: usize) {
        self.items_committed += 1;
        self.bytes_out += payload_len as u64;
    }

    pub fn add_retry(&mut self) {
        self.transform_retries += 1;
    }

    /// A stage found its queue empty and waited.
    pub fn add_idle_wait(&mut self) {
        self.idle_waits += 1;
    }

    pub fn merge(&mut self, other: &TelemetryCounters) {
        self.items_produced += other.items_produced;
        self.items_transformed += other.items_transformed;
        self.items_skipped += other.items_skipped;
        self.items_committed += other.items_committed;

        self.bytes_in += other.bytes_in;
        self.bytes_out += other.bytes_out;
        self.transform_retries += other.transform_retries;
        self.idle_waits += other.idle_waits;
    }
}

impl AddAssign for TelemetryCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
