//! # tokio-courier
//!
//! An in-process event coordinator with a background task runner.
//!
//! ## Features
//!
//! - **Retention policies**: events can wait for a subscriber, keep only the
//!   latest per target, or be delivered once to whoever listens now
//! - **Targeted or broadcast** delivery, routed by subscriber type
//! - **Exact-type dispatch** to handlers declared once per subscriber type
//! - **Thread affinity**: handlers run on a designated main thread or on the
//!   posting thread
//! - **Tagged background tasks** on the tokio runtime
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_courier::prelude::*;
//!
//! struct ProgressBar;
//!
//! impl Subscriber for ProgressBar {
//!     fn handlers(table: &mut HandlerTable<Self>) {
//!         table.on("on_progress", |_bar: &ProgressBar, event: &Event| {
//!             println!("progress: {}%", event.int());
//!             Ok(())
//!         });
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let coordinator = EventCoordinator::builder().build()?;
//!
//!     // Work in the background, reporting progress as it goes
//!     let poster = coordinator.clone();
//!     coordinator.execute_tagged(
//!         move || {
//!             for percent in (0..=100).step_by(10) {
//!                 let _ = Event::to::<ProgressBar>()
//!                     .latest_only()
//!                     .with_number(percent)
//!                     .post(&poster);
//!             }
//!         },
//!         "download",
//!     )?;
//!
//!     // The bar picks up the most recent value when it subscribes
//!     let bar = Arc::new(ProgressBar);
//!     coordinator.subscribe(&bar)?;
//!
//!     coordinator.unsubscribe(&bar);
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    unreachable_pub
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Event values, builder and type-erased envelope
pub mod event;

/// Error types and result aliases
pub mod error;

/// Per-type handler resolution and caching
pub mod registry;

/// Subscriber trait and handler declarations
pub mod subscription;

/// Main-thread schedulers
pub mod dispatcher;

/// Background task execution
pub mod task;

/// The event coordinator
pub mod coordinator;

// Re-export commonly used types
pub use coordinator::{CoordinatorBuilder, CoordinatorConfig, EventCoordinator};
pub use dispatcher::{MainThread, MainThreadScheduler, ManualScheduler};
pub use error::{Error, HandlerError, Result};
pub use event::{
    Affinity, Envelope, Event, EventBuilder, EventMetadata, Notice, Retention, Target, Variant,
};
pub use registry::{DashMapRegistry, HandlerRegistry};
pub use subscription::{
    HandlerDecl, HandlerResult, HandlerTable, ParamKind, Subscriber, Visibility,
};
pub use task::{RunningTasks, TaskRunner};

/// Prelude module for convenient imports
///
/// # Example
/// ```rust
/// use tokio_courier::prelude::*;
/// ```
pub mod prelude {
    pub use crate::coordinator::{EventCoordinator, CoordinatorBuilder};
    pub use crate::error::{Error, HandlerError, Result};
    pub use crate::event::{Event, Notice, Retention, Target, Variant};
    pub use crate::subscription::{HandlerResult, HandlerTable, Subscriber};
}
