use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;
use tracing::{debug, error, info, warn};

use crate::pipeline::config::IdleStrategy;
use crate::pipeline::io::FrameSink;
use crate::pipeline::item::{Completed, Slot};
use crate::pipeline::queue::PopTimeoutError;
use crate::pipeline::reorder::ReorderError;
use crate::pipeline::state::{AbortOnPanic, PipelineState};
use crate::telemetry::{Stage, StageTimes, TelemetryCounters};
use crate::types::PipelineError;
use crate::utils::{digest_hex, format_bytes};

#[derive(Debug, Default)]
pub struct ConsumerReport {
    pub counters: TelemetryCounters,
    pub stage_times: StageTimes,
    /// Hex BLAKE3 over the committed payloads, in commit order.
    pub digest: String,
    pub last_index: Option<u64>,
}

enum Next {
    Item(Completed),
    Empty,
    Done,
}

/// Commits in-order items to the sink.
pub struct Consumer {
    state: Arc<PipelineState>,
    sink: Box<dyn FrameSink>,
    idle: IdleStrategy,
    backoff: Duration,
    progress_interval: u64,
}

impl Consumer {
    /// `sink` must already be open.
    pub fn new(
        state: Arc<PipelineState>,
        sink: Box<dyn FrameSink>,
        idle: IdleStrategy,
        backoff: Duration,
        progress_interval: u64,
    ) -> Self {
        Self { state, sink, idle, backoff, progress_interval: progress_interval.max(1) }
    }

    pub fn run(mut self) -> Result<ConsumerReport, PipelineError> {
        let state = Arc::clone(&self.state);
        let _panic = AbortOnPanic(&state);

        let result = self.consume();
        if let Err(e) = &result {
            if !e.is_cancellation() {
                error!("[CONSUMER] {}", e);
                state.abort();
            }
        }
        result
    }

    fn consume(&mut self) -> Result<ConsumerReport, PipelineError> {
        let mut report = ConsumerReport::default();
        let mut hasher = blake3::Hasher::new();
        let mut expected: u64 = 0;
        let spin = Backoff::new();

        loop {
            let completed = match self.next(&spin, &mut report.counters) {
                Next::Item(c) => c,
                Next::Empty => continue,
                Next::Done => break,
            };
            spin.reset();
            if self.state.is_cancelled() {
                break;
            }
            if completed.index != expected {
                return Err(PipelineError::Reorder(ReorderError::OutOfOrder {
                    index: completed.index,
                    next_expected: expected,
                }));
            }
            expected = completed.index + 1;
            report.last_index = Some(completed.index);

            match completed.slot {
                Slot::Ready(payload) => {
                    let start = Instant::now();
                    self.sink
                        .commit(completed.index, &payload)
                        .map_err(|source| PipelineError::SinkCommit { index: completed.index, source })?;
                    hasher.update(&payload);
                    report.counters.add_committed(payload.len());
                    report.stage_times.add(Stage::Commit, start.elapsed());
                }
                Slot::Skipped { reason } => {
                    warn!("[CONSUMER] index={} not committed: {}", completed.index, reason);
                    self.sink
                        .skip(completed.index, &reason)
                        .map_err(|source| PipelineError::SinkCommit { index: completed.index, source })?;
                }
            }

            if expected % self.progress_interval == 0 {
                info!(
                    "[CONSUMER] progress: {} item(s) handled, {} committed",
                    expected,
                    format_bytes(report.counters.bytes_out)
                );
            }
        }

        if self.state.is_cancelled() {
            debug!("[CONSUMER] cancelled after {} item(s)", expected);
            return Err(PipelineError::Cancelled);
        }

        // Every worker has exited, so nothing can still reach the buffer.
        let reorder = self.state.reorder();
        if !reorder.is_empty() {
            return Err(PipelineError::Stalled {
                next_expected: reorder.next_expected(),
                pending: reorder.pending_len(),
            });
        }

        let start = Instant::now();
        self.sink.finish().map_err(PipelineError::SinkFinish)?;
        report.stage_times.add(Stage::Finish, start.elapsed());

        report.digest = digest_hex(&hasher.finalize());
        info!(
            "[CONSUMER] finished: {} committed, {} skipped, digest={}",
            report.counters.items_committed,
            expected - report.counters.items_committed,
            report.digest
        );
        Ok(report)
    }

    /// The output queue closes only when the last worker exits or the run
    /// is cancelled, so `Done` implies one of the two.
    fn next(&self, spin: &Backoff, counters: &mut TelemetryCounters) -> Next {
        let output = self.state.output();
        match self.idle {
            IdleStrategy::Park => match output.pop_timeout(self.backoff) {
                Ok(c) => Next::Item(c),
                Err(PopTimeoutError::Timeout) => {
                    counters.add_idle_wait();
                    Next::Empty
                }
                Err(PopTimeoutError::Closed) => Next::Done,
            },
            IdleStrategy::Poll => {
                if let Some(c) = output.try_pop() {
                    return Next::Item(c);
                }
                if output.is_drained() {
                    return Next::Done;
                }
                counters.add_idle_wait();
                if spin.is_completed() {
                    thread::sleep(self.backoff);
                    spin.reset();
                } else {
                    spin.snooze();
                }
                Next::Empty
            }
        }
    }
}
