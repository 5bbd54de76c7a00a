//! Subscribers and their handler declarations.
//!
//! A subscriber type lists its handlers once, in [`Subscriber::handlers`].
//! The coordinator resolves that table the first time an instance of the
//! type subscribes and caches the result for the type.

pub mod active;
pub mod handler;

pub use active::{ActiveSet, ActiveSubscriber};
pub use handler::{HandlerDecl, HandlerResult, HandlerTable, ParamKind, Visibility};

/// A type whose instances can receive events.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use tokio_courier::{Event, HandlerTable, Subscriber};
///
/// #[derive(Default)]
/// struct ProgressBar {
///     value: AtomicI64,
/// }
///
/// impl Subscriber for ProgressBar {
///     fn handlers(table: &mut HandlerTable<Self>) {
///         table.on("on_progress", |bar: &ProgressBar, event: &Event| {
///             bar.value.store(event.int(), Ordering::SeqCst);
///             Ok(())
///         });
///     }
/// }
/// ```
pub trait Subscriber: Send + Sync + 'static {
    /// Declare every handler of this type.
    fn handlers(table: &mut HandlerTable<Self>)
    where
        Self: Sized;

    /// Name used in logs and configuration errors
    fn subscriber_name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}
