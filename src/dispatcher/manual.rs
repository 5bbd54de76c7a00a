//! Caller-driven scheduler.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use super::{lock, Callback, MainThreadScheduler};

/// Scheduler whose queue is drained explicitly with [`run_pending`].
///
/// Useful in tests, and for embedding in a foreign event loop that calls
/// `run_pending` once per tick. The thread that created the scheduler is
/// treated as the main thread.
///
/// [`run_pending`]: ManualScheduler::run_pending
pub struct ManualScheduler {
    queue: Mutex<VecDeque<Callback>>,
    owner: ThreadId,
}

impl ManualScheduler {
    /// Create a scheduler owned by the current thread
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            owner: thread::current().id(),
        }
    }

    /// Run queued callbacks, including any they schedule, until the queue is empty.
    ///
    /// Returns the number of callbacks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Release the lock before running so callbacks may schedule more work.
            let next = lock(&self.queue).pop_front();
            match next {
                Some(callback) => {
                    callback();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Number of callbacks waiting
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadScheduler for ManualScheduler {
    fn schedule(&self, callback: Callback) {
        lock(&self.queue).push_back(callback);
    }

    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.owner
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .field("owner", &self.owner)
            .finish()
    }
}
