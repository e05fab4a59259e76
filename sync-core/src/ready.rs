//! Ready-gate queue for itemsync.
//!
//! Work registered before the bootstrap reaches Ready is parked here in
//! FIFO order. Once the gate opens, the parked work is handed back exactly
//! once and later registrations pass straight through.

use std::collections::VecDeque;

/// FIFO queue gated on readiness.
#[derive(Debug)]
pub struct ReadyQueue<T> {
    open: bool,
    queue: VecDeque<T>,
}

impl<T> ReadyQueue<T> {
    /// Create a closed, empty queue.
    pub fn new() -> Self {
        Self {
            open: false,
            queue: VecDeque::new(),
        }
    }

    /// Register work.
    ///
    /// Returns the work back when the gate is already open, meaning the
    /// caller should run it now. Otherwise it is parked and `None` returned.
    pub fn register(&mut self, work: T) -> Option<T> {
        if self.open {
            return Some(work);
        }
        self.queue.push_back(work);
        None
    }

    /// Open the gate and take every parked entry in registration order.
    ///
    /// Opening an already open gate returns nothing.
    pub fn open(&mut self) -> Vec<T> {
        self.open = true;
        self.queue.drain(..).collect()
    }

    /// Whether the gate is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of parked entries.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> Default for ReadyQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
