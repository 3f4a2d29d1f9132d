use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::TelemetryCounters;
use crate::telemetry::timers::{StageTimes, TelemetryTimer};

/// Immutable result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub items_produced: u64,
    pub items_transformed: u64,
    pub items_skipped: u64,
    pub items_committed: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub transform_retries: u64,
    pub idle_waits: u64,
    pub workers: usize,
    /// Items each worker dequeued, by worker id.
    pub items_per_worker: Vec<u64>,
    /// Most entries the reorder buffer held at once.
    pub reorder_high_water: usize,
    pub throughput_bytes_per_sec: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
    /// Hex BLAKE3 of the committed payloads, in commit order.
    pub output_digest: Option<String>,
}

impl TelemetrySnapshot {
    pub fn from(counters: &TelemetryCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();

        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_out as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            items_produced: counters.items_produced,
            items_transformed: counters.items_transformed,
            items_skipped: counters.items_skipped,
            items_committed: counters.items_committed,
            bytes_in: counters.bytes_in,
            bytes_out: counters.bytes_out,
            transform_retries: counters.transform_retries,
            idle_waits: counters.idle_waits,
            workers: 0,
            items_per_worker: Vec::new(),
            reorder_high_water: 0,
            throughput_bytes_per_sec: throughput,
            elapsed,
            stage_times: timer.stage_times.clone(),
            output_digest: None,
        }
    }

    pub fn with_workers(mut self, items_per_worker: Vec<u64>) -> Self {
        self.workers = items_per_worker.len();
        self.items_per_worker = items_per_worker;
        self
    }

    pub fn with_reorder_high_water(mut self, high_water: usize) -> Self {
        self.reorder_high_water = high_water;
        self
    }

    pub fn with_output_digest(mut self, digest: String) -> Self {
        self.output_digest = Some(digest);
        self
    }

    /// Every produced item was either committed or skipped, and every
    /// dequeued item was accounted for by exactly one worker.
    pub fn sanity_check(&self) -> bool {
        self.items_committed + self.items_skipped == self.items_produced
            && self.items_transformed + self.items_skipped == self.items_produced
            && self.items_per_worker.iter().sum::<u64>() == self.items_produced
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
