//! Blocking FIFO shared by the input and output legs.
//!
//! One mutex guards the deque and the closed flag; `not_empty` wakes
//! poppers, `not_full` wakes pushers blocked on a bounded queue. Once
//! closed, pushes are refused and pops drain what is left, then report
//! closure instead of blocking.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Push refused because the queue is closed. Hands the item back.
#[derive(Error)]
#[error("queue closed")]
pub struct QueueClosed<T>(pub T);

impl<T> fmt::Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueClosed(..)")
    }
}

#[derive(Error)]
pub enum TryPushError<T> {
    #[error("queue full")]
    Full(T),
    #[error("queue closed")]
    Closed(T),
}

impl<T> TryPushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => f.write_str("Full(..)"),
            TryPushError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PopTimeoutError {
    #[error("timed out waiting for an item")]
    Timeout,
    #[error("queue closed and drained")]
    Closed,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct BlockingQueue<T> {
    inner: Mutex<QueueInner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BlockingQueue")
            .field("len", &inner.items.len())
            .field("closed", &inner.closed)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> BlockingQueue<T> {
    /// Unbounded queue.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Queue whose `push` blocks while `capacity` items are waiting.
    /// A capacity of 0 is treated as 1.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(QueueInner { items: VecDeque::new(), closed: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Append an item, blocking while a bounded queue is full.
    pub fn push(&self, item: T) -> Result<(), QueueClosed<T>> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(QueueClosed(item));
            }
            match self.capacity {
                Some(cap) if inner.items.len() >= cap => self.not_full.wait(&mut inner),
                _ => break,
            }
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append without blocking.
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(TryPushError::Closed(item));
        }
        if let Some(cap) = self.capacity {
            if inner.items.len() >= cap {
                return Err(TryPushError::Full(item));
            }
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Block until an item is available. `None` once closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Block for at most `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopTimeoutError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Ok(item);
            }
            if inner.closed {
                return Err(PopTimeoutError::Closed);
            }
            if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                // One last look: an item may have landed with the timeout.
                return match inner.items.pop_front() {
                    Some(item) => {
                        drop(inner);
                        self.not_full.notify_one();
                        Ok(item)
                    }
                    None if inner.closed => Err(PopTimeoutError::Closed),
                    None => Err(PopTimeoutError::Timeout),
                };
            }
        }
    }

    /// Never blocks.
    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();
        drop(inner);
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Refuse further pushes and wake every waiter on both sides.
    /// Items already queued remain poppable.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        drop(inner);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Closed with nothing left to pop.
    pub fn is_drained(&self) -> bool {
        let inner = self.inner.lock();
        inner.closed && inner.items.is_empty()
    }
}
