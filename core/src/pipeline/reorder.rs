//! Reorder buffer: out-of-order completion in, strictly ascending indices out.
//!
//! The pending map and the `next_expected` cursor live behind one mutex.
//! A drain removes the entry for `next_expected`, pushes it to the output
//! queue and advances the cursor in the same critical section, so racing
//! drains from different workers emit the same sequence a single drainer
//! would.
//!
//! # Example
//!
//! ```
//! use framecrypt_core::pipeline::{BlockingQueue, Completed, ReorderBuffer, Slot};
//! use bytes::BytesMut;
//!
//! let buffer = ReorderBuffer::new();
//! let out: BlockingQueue<Completed> = BlockingQueue::new();
//!
//! buffer.insert_and_drain(2, Slot::Ready(BytesMut::new()), &out).unwrap();
//! buffer.insert_and_drain(0, Slot::Ready(BytesMut::new()), &out).unwrap();
//! buffer.insert_and_drain(1, Slot::Ready(BytesMut::new()), &out).unwrap();
//!
//! let order: Vec<u64> = std::iter::from_fn(|| out.try_pop()).map(|c| c.index).collect();
//! assert_eq!(order, vec![0, 1, 2]);
//! ```

use std::collections::BTreeMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::pipeline::item::{Completed, Slot};
use crate::pipeline::queue::BlockingQueue;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    /// Index already emitted.
    #[error("index {index} is behind the cursor ({next_expected})")]
    Stale { index: u64, next_expected: u64 },

    /// Index already waiting in the buffer.
    #[error("index {index} is already pending")]
    Duplicate { index: u64 },

    /// The consumer received an index other than the one it expected.
    #[error("index {index} arrived while {next_expected} was expected")]
    OutOfOrder { index: u64, next_expected: u64 },

    /// The output queue was closed under a drain; the run is being torn down.
    #[error("output queue closed while draining index {index}")]
    OutputClosed { index: u64 },
}

#[derive(Debug, Default)]
struct ReorderInner {
    pending: BTreeMap<u64, Slot>,
    next_expected: u64,
    high_water: usize,
}

#[derive(Debug, Default)]
pub struct ReorderBuffer {
    inner: Mutex<ReorderInner>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the cursor somewhere other than 0.
    pub fn with_start(next_expected: u64) -> Self {
        Self {
            inner: Mutex::new(ReorderInner { next_expected, ..Default::default() }),
        }
    }

    /// Park a completed slot until its predecessors have been emitted.
    pub fn insert(&self, index: u64, slot: Slot) -> Result<(), ReorderError> {
        let mut inner = self.inner.lock();
        Self::insert_locked(&mut inner, index, slot)
    }

    /// Emit the contiguous run starting at the cursor. Returns how many
    /// entries were pushed to `out`.
    pub fn drain_into(&self, out: &BlockingQueue<Completed>) -> Result<usize, ReorderError> {
        let mut inner = self.inner.lock();
        Self::drain_locked(&mut inner, out)
    }

    /// Insert then drain under a single acquisition of the lock.
    pub fn insert_and_drain(
        &self,
        index: u64,
        slot: Slot,
        out: &BlockingQueue<Completed>,
    ) -> Result<usize, ReorderError> {
        let mut inner = self.inner.lock();
        Self::insert_locked(&mut inner, index, slot)?;
        Self::drain_locked(&mut inner, out)
    }

    fn insert_locked(inner: &mut ReorderInner, index: u64, slot: Slot) -> Result<(), ReorderError> {
        if index < inner.next_expected {
            return Err(ReorderError::Stale { index, next_expected: inner.next_expected });
        }
        if inner.pending.contains_key(&index) {
            return Err(ReorderError::Duplicate { index });
        }
        inner.pending.insert(index, slot);
        inner.high_water = inner.high_water.max(inner.pending.len());
        Ok(())
    }

    fn drain_locked(
        inner: &mut ReorderInner,
        out: &BlockingQueue<Completed>,
    ) -> Result<usize, ReorderError> {
        let mut emitted = 0;
        while let Some(slot) = inner.pending.remove(&inner.next_expected) {
            let index = inner.next_expected;
            out.push(Completed { index, slot })
                .map_err(|_| ReorderError::OutputClosed { index })?;
            inner.next_expected += 1;
            emitted += 1;
        }
        Ok(emitted)
    }

    pub fn next_expected(&self) -> u64 {
        self.inner.lock().next_expected
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    /// Indices waiting for a predecessor, ascending.
    pub fn pending_indices(&self) -> Vec<u64> {
        self.inner.lock().pending.keys().copied().collect()
    }

    pub fn high_water(&self) -> usize {
        self.inner.lock().high_water
    }
}
