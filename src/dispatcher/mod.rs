//! Main-thread scheduling for thread-affine handlers.
//!
//! Events with [`Affinity::MainThread`](crate::Affinity::MainThread) are not
//! handled on the posting thread. The coordinator hands each handler call to a
//! [`MainThreadScheduler`], which runs callbacks one at a time, in the order
//! they were scheduled, on a single designated thread.

use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod main_thread;
pub mod manual;

pub use main_thread::MainThread;
pub use manual::ManualScheduler;

/// A unit of work handed to the main thread
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Trait for main-thread schedulers.
///
/// `schedule` must not run the callback inline: it is called while the
/// coordinator holds its lock.
pub trait MainThreadScheduler: Send + Sync + Debug {
    /// Queue `callback` behind everything scheduled before it
    fn schedule(&self, callback: Callback);

    /// Check whether the calling thread is the main thread
    fn is_main_thread(&self) -> bool;
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
