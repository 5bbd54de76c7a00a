//! A dedicated OS thread acting as the main thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{lock, Callback, MainThreadScheduler};
use crate::error::panic_message;
use crate::{Error, Result};

/// Main-thread scheduler backed by its own named thread.
///
/// Callbacks travel over an unbounded channel and run strictly in FIFO order.
/// A panicking callback is logged and the loop keeps going.
pub struct MainThread {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Callback>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
    executed: Arc<AtomicU64>,
}

impl MainThread {
    /// Spawn the thread
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel::<Callback>();
        let executed = Arc::new(AtomicU64::new(0));

        let loop_name = name.clone();
        let loop_executed = executed.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run(receiver, loop_name, loop_executed))
            .map_err(|e| Error::internal(format!("failed to spawn main thread: {}", e)))?;

        info!(thread = %name, "Main thread started");

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
            executed,
        })
    }

    fn run(
        mut receiver: mpsc::UnboundedReceiver<Callback>,
        name: String,
        executed: Arc<AtomicU64>,
    ) {
        while let Some(callback) = receiver.blocking_recv() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(callback)) {
                error!(
                    thread = %name,
                    panic = %panic_message(panic.as_ref()),
                    "Main-thread callback panicked"
                );
            }
            executed.fetch_add(1, Ordering::Relaxed);
        }
        debug!(thread = %name, "Main thread stopped");
    }

    /// Thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the main thread
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Number of callbacks run so far
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Stop accepting callbacks, let queued ones finish, and join the thread.
    ///
    /// Called from the main thread itself, this only closes the queue.
    pub fn shutdown(&self) -> Result<()> {
        lock(&self.sender).take();

        if self.is_main_thread() {
            return Ok(());
        }

        if let Some(handle) = lock(&self.handle).take() {
            handle
                .join()
                .map_err(|_| Error::internal("main thread panicked"))?;
            info!(thread = %self.name, "Main thread joined");
        }
        Ok(())
    }
}

impl MainThreadScheduler for MainThread {
    fn schedule(&self, callback: Callback) {
        let sender = lock(&self.sender);
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(callback).is_err() {
                    warn!(thread = %self.name, "Main thread gone, dropping callback");
                }
            }
            None => warn!(thread = %self.name, "Main thread shut down, dropping callback"),
        }
    }

    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for MainThread {
    fn drop(&mut self) {
        // Closing the channel ends the loop once the queue drains.
        lock(&self.sender).take();
    }
}

impl std::fmt::Debug for MainThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThread")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .field("executed", &self.executed())
            .finish()
    }
}
