//! Transform workers.
//!
//! Each worker pulls an item, XORs the per-item keystream into the payload
//! in place, parks the result in the reorder buffer and drains whatever run
//! has become contiguous. Workers never coordinate with each other beyond the
//! shared queues and the reorder lock.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;
use tracing::{debug, error, trace, warn};

use crate::keystream::{xor_keystream_resume, KeystreamGenerator, MasterKey};
use crate::pipeline::config::{ErrorPolicy, IdleStrategy};
use crate::pipeline::item::{Slot, WorkItem};
use crate::pipeline::queue::PopTimeoutError;
use crate::pipeline::reorder::ReorderError;
use crate::pipeline::state::{AbortOnPanic, PipelineState};
use crate::telemetry::{Stage, StageTimes, TelemetryCounters};
use crate::types::PipelineError;

/// Settings shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub generator: Arc<dyn KeystreamGenerator>,
    pub key: MasterKey,
    pub idle: IdleStrategy,
    pub backoff: Duration,
    pub transform_retries: u32,
    pub on_error: ErrorPolicy,
}

#[derive(Debug, Default)]
pub struct WorkerReport {
    pub id: usize,
    pub counters: TelemetryCounters,
    pub stage_times: StageTimes,
    /// Items this worker dequeued.
    pub items: u64,
}

/// Decrements the active-worker count on every exit path.
struct ExitGuard<'a>(&'a PipelineState);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}

pub struct TransformWorker {
    id: usize,
    state: Arc<PipelineState>,
    ctx: WorkerContext,
    scratch: Vec<u8>,
}

impl TransformWorker {
    pub fn new(id: usize, state: Arc<PipelineState>, ctx: WorkerContext) -> Self {
        Self { id, state, ctx, scratch: Vec::new() }
    }

    pub fn run(mut self) -> Result<WorkerReport, PipelineError> {
        let state = Arc::clone(&self.state);
        let _exit = ExitGuard(&state);
        let _panic = AbortOnPanic(&state);

        let mut report = WorkerReport { id: self.id, ..Default::default() };
        let spin = Backoff::new();

        loop {
            let item = match self.next_item(&spin, &mut report.counters) {
                Some(item) => item,
                None if state.worker_should_exit() => break,
                None => continue,
            };
            spin.reset();
            report.items += 1;

            if state.is_cancelled() {
                break;
            }

            match self.process(item, &mut report) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!("[WORKER-{}] {}", self.id, e);
                    state.abort();
                    return Err(e);
                }
            }
        }

        debug!("[WORKER-{}] exiting after {} item(s)", self.id, report.items);
        Ok(report)
    }

    /// One dequeue attempt. `None` means the queue was empty (or closed) and
    /// the caller should re-check the exit condition.
    fn next_item(&self, spin: &Backoff, counters: &mut TelemetryCounters) -> Option<WorkItem> {
        let input = self.state.input();
        match self.ctx.idle {
            IdleStrategy::Park => match input.pop_timeout(self.ctx.backoff) {
                Ok(item) => Some(item),
                Err(PopTimeoutError::Timeout) => {
                    counters.add_idle_wait();
                    None
                }
                Err(PopTimeoutError::Closed) => None,
            },
            IdleStrategy::Poll => {
                if let Some(item) = input.try_pop() {
                    return Some(item);
                }
                if input.is_closed() {
                    return None;
                }
                counters.add_idle_wait();
                if spin.is_completed() {
                    thread::sleep(self.ctx.backoff);
                    spin.reset();
                } else {
                    spin.snooze();
                }
                None
            }
        }
    }

    /// Transform one item and hand it to the reorder buffer. `Ok(false)`
    /// means the output side is closed and the worker should stop.
    fn process(&mut self, item: WorkItem, report: &mut WorkerReport) -> Result<bool, PipelineError> {
        let WorkItem { index, mut payload } = item;
        let seed = self.ctx.key.seed_for(index);

        let start = Instant::now();
        let mut done = 0usize;
        let mut attempts: u32 = 0;
        let slot = loop {
            attempts += 1;
            match xor_keystream_resume(
                self.ctx.generator.as_ref(),
                seed,
                &mut payload,
                &mut done,
                &mut self.scratch,
            ) {
                Ok(()) => {
                    report.counters.add_transformed();
                    break Slot::Ready(payload);
                }
                Err(e) if e.is_transient() && attempts <= self.ctx.transform_retries => {
                    warn!(
                        "[WORKER-{}] index={} attempt={} transient keystream error: {}",
                        self.id, index, attempts, e
                    );
                    report.counters.add_retry();
                    if self.state.is_cancelled() {
                        return Ok(false);
                    }
                }
                Err(e) => match self.ctx.on_error {
                    ErrorPolicy::Abort => {
                        return Err(PipelineError::Transform { index, attempts, source: e });
                    }
                    ErrorPolicy::Skip => {
                        warn!("[WORKER-{}] index={} skipped: {}", self.id, index, e);
                        report.counters.add_skipped();
                        break Slot::Skipped { reason: e.to_string() };
                    }
                },
            }
        };
        report.stage_times.add(Stage::Transform, start.elapsed());

        let start = Instant::now();
        let result = self
            .state
            .reorder()
            .insert_and_drain(index, slot, self.state.output());
        report.stage_times.add(Stage::Reorder, start.elapsed());

        match result {
            Ok(emitted) => {
                trace!("[WORKER-{}] index={} emitted={}", self.id, index, emitted);
                Ok(true)
            }
            Err(ReorderError::OutputClosed { .. }) => Ok(false),
            Err(e) => Err(PipelineError::Reorder(e)),
        }
    }
}

/// Fixed set of worker threads for one run.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<Result<WorkerReport, PipelineError>>>,
}

impl WorkerPool {
    /// Spawn `count` workers named `framecrypt-worker-{i}`.
    ///
    /// If a spawn fails the run is aborted, the already-running workers are
    /// joined, and the spawn error is returned.
    pub fn spawn(
        state: &Arc<PipelineState>,
        count: usize,
        ctx: &WorkerContext,
    ) -> Result<Self, PipelineError> {
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let worker = TransformWorker::new(id, Arc::clone(state), ctx.clone());
            let spawned = thread::Builder::new()
                .name(format!("framecrypt-worker-{id}"))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    state.abort();
                    // Account for the workers that will never run.
                    for _ in id..count {
                        state.worker_exited();
                    }
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(PipelineError::Spawn { stage: format!("worker-{id}"), source });
                }
            }
        }

        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Join every worker, in id order.
    pub fn join(self) -> Vec<Result<WorkerReport, PipelineError>> {
        self.handles
            .into_iter()
            .enumerate()
            .map(|(id, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(PipelineError::StagePanicked { stage: format!("worker-{id}") }))
            })
            .collect()
    }
}
