//! Handler registry for mapping subscriber types to their handlers.
//!
//! Each subscriber type is resolved once: its [`HandlerTable`] is filled,
//! validated, and turned into a list of type-erased [`Binding`]s keyed on the
//! exact event variant. Resolutions are cached and never evicted.
//!
//! [`HandlerTable`]: crate::subscription::HandlerTable

use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::event::Envelope;
use crate::subscription::{HandlerResult, HandlerTable, Subscriber};
use crate::Result;

mod dashmap;
pub use self::dashmap::DashMapRegistry;

/// Type-erased handler: (subscriber instance, event) -> outcome
pub type Invoker = Arc<dyn Fn(&(dyn Any + Send + Sync), &Envelope) -> HandlerResult + Send + Sync>;

/// One resolved handler of a subscriber type
#[derive(Clone)]
pub struct Binding {
    /// Variant type the handler accepts
    pub event_type: TypeId,

    /// Variant name, for logs
    pub event_name: &'static str,

    /// Handler name, for logs
    pub handler: &'static str,

    pub(crate) invoke: Invoker,
}

impl Binding {
    /// Run the handler against a live subscriber instance
    pub fn invoke(&self, instance: &(dyn Any + Send + Sync), envelope: &Envelope) -> HandlerResult {
        (self.invoke)(instance, envelope)
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("event_name", &self.event_name)
            .field("handler", &self.handler)
            .finish()
    }
}

/// All handlers of one subscriber type
#[derive(Debug)]
pub struct ResolvedHandlers {
    subscriber: &'static str,
    bindings: Vec<Binding>,
}

impl ResolvedHandlers {
    /// Wrap already validated bindings
    pub fn new(subscriber: &'static str, bindings: Vec<Binding>) -> Self {
        Self {
            subscriber,
            bindings,
        }
    }

    /// Build the handlers of `S` from its declaration table
    pub fn build<S: Subscriber>() -> Result<Self> {
        let mut table = HandlerTable::<S>::new();
        S::handlers(&mut table);
        Ok(Self::new(S::subscriber_name(), table.into_bindings()?))
    }

    /// Subscriber type name
    pub fn subscriber(&self) -> &'static str {
        self.subscriber
    }

    /// Handlers whose declared variant is exactly `event_type`
    pub fn for_event(&self, event_type: TypeId) -> impl Iterator<Item = &Binding> {
        self.bindings
            .iter()
            .filter(move |b| b.event_type == event_type)
    }

    /// Number of handlers
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check whether the type declared no handlers
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Trait for registries caching resolved handlers per subscriber type.
///
/// Implementations must be thread-safe; resolution can race from several
/// threads subscribing at once.
pub trait HandlerRegistry: Send + Sync + Debug {
    /// Return the cached handlers for `subscriber_type`, running `build` on a miss.
    ///
    /// Failed builds are not cached.
    fn resolve_with(
        &self,
        subscriber_type: TypeId,
        build: &mut dyn FnMut() -> Result<ResolvedHandlers>,
    ) -> Result<Arc<ResolvedHandlers>>;

    /// Check whether `subscriber_type` has been resolved
    fn contains(&self, subscriber_type: TypeId) -> bool;

    /// Number of resolved subscriber types
    fn len(&self) -> usize;

    /// Check whether nothing has been resolved yet
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl dyn HandlerRegistry {
    /// Resolve the handlers of subscriber type `S`
    pub fn resolve<S: Subscriber>(&self) -> Result<Arc<ResolvedHandlers>> {
        self.resolve_with(TypeId::of::<S>(), &mut ResolvedHandlers::build::<S>)
    }
}
