//! Background task execution with optional tags.
//!
//! The [`TaskRunner`] hands work to the tokio runtime without limit: blocking
//! closures go to the blocking pool, futures to the worker threads. A tagged
//! task is recorded in [`RunningTasks`] for exactly as long as its body runs,
//! so callers can avoid starting the same job twice.
//!
//! `is_running` followed by `execute_tagged` is not atomic. Use
//! [`TaskRunner::execute_if_idle`] when two callers may race.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, trace};

use crate::error::panic_message;
use crate::{Error, Result};

/// Counted set of tags whose tasks are running.
///
/// A tag stays present while at least one task carrying it runs.
#[derive(Debug, Clone, Default)]
pub struct RunningTasks {
    tags: Arc<DashMap<String, usize>>,
}

impl RunningTasks {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a task with `tag` is running
    pub fn is_running(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    /// Mark one more task with `tag` as running until the guard drops
    pub fn acquire(&self, tag: impl Into<String>) -> RunningGuard {
        let tag = tag.into();
        *self.tags.entry(tag.clone()).or_insert(0) += 1;
        trace!(tag = %tag, "Task tag acquired");
        RunningGuard {
            tasks: self.clone(),
            tag,
        }
    }

    /// Mark `tag` as running only if no task with it runs yet
    pub fn try_acquire(&self, tag: impl Into<String>) -> Option<RunningGuard> {
        let tag = tag.into();
        match self.tags.entry(tag.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(1);
                trace!(tag = %tag, "Task tag reserved");
                Some(RunningGuard {
                    tasks: self.clone(),
                    tag,
                })
            }
        }
    }

    fn release(&self, tag: &str) {
        if let Entry::Occupied(mut occupied) = self.tags.entry(tag.to_string()) {
            *occupied.get_mut() -= 1;
            if *occupied.get() == 0 {
                occupied.remove();
            }
        }
        trace!(tag = %tag, "Task tag released");
    }

    /// Tags currently running, in no particular order
    pub fn tags(&self) -> Vec<String> {
        self.tags.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of distinct running tags
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Check whether nothing tagged is running
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Keeps a tag registered; releases it on drop, including during unwinding.
#[derive(Debug)]
pub struct RunningGuard {
    tasks: RunningTasks,
    tag: String,
}

impl RunningGuard {
    /// The guarded tag
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.tasks.release(&self.tag);
    }
}

/// Submits work to an unbounded pool.
///
/// There is no back-pressure: every submission is accepted, and a burst of
/// blocking tasks grows the runtime's blocking pool up to its configured cap.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    handle: Handle,
    running: RunningTasks,
}

impl TaskRunner {
    /// Create a runner on `handle`
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            running: RunningTasks::new(),
        }
    }

    /// Create a runner on the current tokio runtime
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| Error::NoRuntime)
    }

    /// Run a blocking task in the background
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        trace!("Submitting task");
        self.handle.spawn_blocking(move || run_guarded(None, task));
    }

    /// Run a blocking task in the background, marking `tag` as running while it does.
    ///
    /// Duplicate tags are not rejected.
    pub fn execute_tagged<F>(&self, task: F, tag: impl Into<String>) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let tag = validate_tag(tag.into())?;
        let running = self.running.clone();

        debug!(tag = %tag, "Submitting tagged task");
        self.handle.spawn_blocking(move || {
            let guard = running.acquire(tag);
            run_guarded(Some(guard.tag()), task);
        });
        Ok(())
    }

    /// Run a blocking task under `tag` unless one is already running.
    ///
    /// The tag is reserved at submission, so concurrent callers cannot both
    /// start the job. Returns whether the task was submitted.
    pub fn execute_if_idle<F>(&self, task: F, tag: impl Into<String>) -> Result<bool>
    where
        F: FnOnce() + Send + 'static,
    {
        let tag = validate_tag(tag.into())?;
        let Some(guard) = self.running.try_acquire(tag.clone()) else {
            debug!(tag = %tag, "Task already running, not submitting");
            return Ok(false);
        };

        debug!(tag = %tag, "Submitting tagged task");
        self.handle.spawn_blocking(move || {
            run_guarded(Some(guard.tag()), task);
        });
        Ok(true)
    }

    /// Run an async task in the background
    pub fn spawn<Fut>(&self, future: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(async move {
            if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
                error!(panic = %panic_message(panic.as_ref()), "Task panicked");
            }
        });
    }

    /// Run an async task in the background, marking `tag` as running while it does
    pub fn spawn_tagged<Fut>(&self, future: Fut, tag: impl Into<String>) -> Result<()>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let tag = validate_tag(tag.into())?;
        let running = self.running.clone();

        self.handle.spawn(async move {
            let guard = running.acquire(tag);
            if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
                error!(tag = %guard.tag(), panic = %panic_message(panic.as_ref()), "Task panicked");
            }
        });
        Ok(())
    }

    /// Check whether a task with `tag` is running
    pub fn is_running(&self, tag: &str) -> bool {
        self.running.is_running(tag)
    }

    /// The running-task set
    pub fn running(&self) -> &RunningTasks {
        &self.running
    }
}

fn validate_tag(tag: String) -> Result<String> {
    if tag.is_empty() {
        return Err(Error::invalid_argument("task tag cannot be empty"));
    }
    Ok(tag)
}

fn run_guarded<F: FnOnce()>(tag: Option<&str>, task: F) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
        error!(tag = ?tag, panic = %panic_message(panic.as_ref()), "Task panicked");
    }
}
