//! Bounded FIFO of callers waiting for a measurement.
//!
//! Insertion order is service order: the oldest reader receives the next
//! completed measurement.

use heapless::Deque;

use crate::error::SensorError;

/// Maximum number of callers that may wait for a measurement at once.
pub const READER_QUEUE_CAPACITY: usize = 10;

/// Enqueue rejected; hands the reader back so the caller can be answered.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueFull<R>(pub R);

/// Dequeue on an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEmpty;

impl<R> From<QueueFull<R>> for SensorError {
    fn from(_: QueueFull<R>) -> Self {
        Self::QueueFull
    }
}

impl From<QueueEmpty> for SensorError {
    fn from(_: QueueEmpty) -> Self {
        Self::QueueEmpty
    }
}

#[derive(Debug)]
pub struct ReaderQueue<R> {
    inner: Deque<R, READER_QUEUE_CAPACITY>,
}

impl<R> Default for ReaderQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ReaderQueue<R> {
    pub const fn new() -> Self {
        Self {
            inner: Deque::new(),
        }
    }

    pub fn enqueue(&mut self, reader: R) -> Result<(), QueueFull<R>> {
        self.inner.push_back(reader).map_err(QueueFull)
    }

    pub fn dequeue(&mut self) -> Result<R, QueueEmpty> {
        self.inner.pop_front().ok_or(QueueEmpty)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}
