//! FIFO queue of recognized intents
//!
//! Shared between the enqueue side (session transport, terminal input) and
//! the single dispatcher poller. The queue is always mutex-protected; the
//! lock is held only for the push/pop itself.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::task::Task;
use crate::{Error, Result};

/// Ordered queue of tasks awaiting dispatch
#[derive(Debug, Default)]
pub struct TaskQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the back of the queue
    pub fn push(&self, task: Task) {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back(task);
    }

    /// Remove and return the oldest task
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueEmpty`] if there is nothing to dequeue; this
    /// is the expected signal for a poller that outpaced the producers.
    pub fn pop(&self) -> Result<Task> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.pop_front().ok_or(Error::QueueEmpty)
    }

    /// Number of queued tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
