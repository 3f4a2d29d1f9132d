//! Shared run state, owned by the controller and handed to every stage by `Arc`.
//!
//! Termination is never read off a flag alone: workers exit once the input
//! queue is closed and drained, and the consumer exits once the output queue
//! is, which only happens after the last worker has left.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::pipeline::item::{Completed, WorkItem};
use crate::pipeline::queue::BlockingQueue;
use crate::pipeline::reorder::ReorderBuffer;

#[derive(Debug)]
pub struct PipelineState {
    finished: AtomicBool,
    cancelled: AtomicBool,
    active_workers: AtomicUsize,
    input: BlockingQueue<WorkItem>,
    reorder: ReorderBuffer,
    output: BlockingQueue<Completed>,
}

impl PipelineState {
    /// `workers` is the number of workers that will call [`worker_exited`]
    /// exactly once each.
    ///
    /// [`worker_exited`]: PipelineState::worker_exited
    pub fn new(workers: usize, input_cap: Option<usize>, output_cap: Option<usize>) -> Self {
        Self {
            finished: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            active_workers: AtomicUsize::new(workers),
            input: BlockingQueue::with_capacity(input_cap.map(|c| c.max(1))),
            reorder: ReorderBuffer::new(),
            output: BlockingQueue::with_capacity(output_cap.map(|c| c.max(1))),
        }
    }

    /// Producer signal: no more items will be pushed. Closes the input
    /// queue. Returns `false` if it had already been called.
    pub fn mark_finished(&self) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.input.close();
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Stop the run. Both queues are closed so every blocked stage wakes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.input.close();
        self.output.close();
    }

    /// Internal failure path; same effect as an external cancel.
    pub fn abort(&self) {
        self.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Worker exit test, re-evaluated after every empty dequeue.
    pub fn worker_should_exit(&self) -> bool {
        self.is_cancelled() || (self.is_finished() && self.input.is_empty())
    }

    /// Called once per worker on the way out. The last one closes the
    /// output queue; returns `true` for that caller.
    pub fn worker_exited(&self) -> bool {
        let prev = self.active_workers.fetch_sub(1, Ordering::AcqRel);
        if prev == 1 {
            self.output.close();
            return true;
        }
        false
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Acquire)
    }

    pub fn workers_done(&self) -> bool {
        self.active_workers() == 0
    }

    pub fn input(&self) -> &BlockingQueue<WorkItem> {
        &self.input
    }

    pub fn reorder(&self) -> &ReorderBuffer {
        &self.reorder
    }

    pub fn output(&self) -> &BlockingQueue<Completed> {
        &self.output
    }
}

/// Aborts the run if the owning stage unwinds, so no other stage is left
/// blocked on a queue the dead stage would have serviced.
pub(crate) struct AbortOnPanic<'a>(pub(crate) &'a PipelineState);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort();
        }
    }
}
