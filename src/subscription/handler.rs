//! Handler declarations and the per-type registration table.

use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::error::HandlerError;
use crate::event::{Envelope, Event, Variant};
use crate::registry::{Binding, Invoker};
use crate::subscription::Subscriber;
use crate::{Error, Result};

/// Result returned by every handler
pub type HandlerResult = std::result::Result<(), HandlerError>;

type TypedInvoker<S> = Arc<dyn Fn(&S, &Envelope) -> HandlerResult + Send + Sync>;

/// Declared type of one handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// An event variant; the handler is keyed on this type
    Variant {
        /// Dispatch key of the variant
        type_id: TypeId,
        /// Variant name
        name: &'static str,
    },
    /// Anything that is not an event variant
    Other {
        /// Type name
        name: &'static str,
    },
}

impl ParamKind {
    /// Parameter of event variant `V`
    pub fn variant<V: Variant>() -> Self {
        ParamKind::Variant {
            type_id: V::type_id(),
            name: V::variant_name(),
        }
    }

    /// Parameter of a non-event type `T`
    pub fn other<T: ?Sized + 'static>() -> Self {
        ParamKind::Other {
            name: std::any::type_name::<T>(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ParamKind::Variant { name, .. } | ParamKind::Other { name } => name,
        }
    }
}

/// Whether a declared handler may be invoked by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Callable by the coordinator
    #[default]
    Public,
    /// Declared but not callable; rejected at resolution
    Private,
}

/// Signature of a handler registered through [`HandlerTable::declare`].
///
/// Declarations are checked when the subscriber type is first resolved:
/// exactly one parameter, that parameter an event variant, and public
/// visibility.
#[derive(Debug, Clone)]
pub struct HandlerDecl {
    name: &'static str,
    params: Vec<ParamKind>,
    visibility: Visibility,
}

impl HandlerDecl {
    /// Start a public declaration with no parameters
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
            visibility: Visibility::Public,
        }
    }

    /// Append a parameter
    pub fn param(mut self, param: ParamKind) -> Self {
        self.params.push(param);
        self
    }

    /// Set the visibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Handler name
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn validate(&self, subscriber: &'static str) -> Result<(TypeId, &'static str)> {
        if self.params.len() != 1 {
            return Err(Error::configuration(format!(
                "handler `{}` on `{}` declares {} parameters; handlers take exactly one event",
                self.name,
                subscriber,
                self.params.len()
            )));
        }

        let (type_id, event_name) = match self.params[0] {
            ParamKind::Variant { type_id, name } => (type_id, name),
            other => {
                return Err(Error::configuration(format!(
                    "handler `{}` on `{}` must take an event variant, found `{}`",
                    self.name,
                    subscriber,
                    other.name()
                )))
            }
        };

        if self.visibility != Visibility::Public {
            return Err(Error::configuration(format!(
                "handler `{}` on `{}` must be public",
                self.name, subscriber
            )));
        }

        Ok((type_id, event_name))
    }
}

struct Candidate<S> {
    decl: HandlerDecl,
    invoke: TypedInvoker<S>,
}

/// Table a [`Subscriber`] fills in to declare its handlers.
pub struct HandlerTable<S> {
    candidates: Vec<Candidate<S>>,
}

impl<S: Subscriber> HandlerTable<S> {
    pub(crate) fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// Bind a handler for events whose variant is exactly `V`
    pub fn on<V, F>(&mut self, name: &'static str, handler: F) -> &mut Self
    where
        V: Variant,
        F: Fn(&S, &Event<V>) -> HandlerResult + Send + Sync + 'static,
    {
        let invoke: TypedInvoker<S> = Arc::new(move |subscriber: &S, envelope: &Envelope| {
            match envelope.downcast_ref::<V>() {
                Some(event) => handler(subscriber, event),
                None => Err(HandlerError::failed(format!(
                    "expected {}, got {}",
                    V::variant_name(),
                    envelope.event_type()
                ))),
            }
        });

        self.candidates.push(Candidate {
            decl: HandlerDecl::new(name).param(ParamKind::variant::<V>()),
            invoke,
        });
        self
    }

    /// Register a handler from an explicit declaration.
    ///
    /// The handler receives the raw envelope and is checked against `decl`
    /// when the subscriber type is resolved.
    pub fn declare<F>(&mut self, decl: HandlerDecl, handler: F) -> &mut Self
    where
        F: Fn(&S, &Envelope) -> HandlerResult + Send + Sync + 'static,
    {
        self.candidates.push(Candidate {
            decl,
            invoke: Arc::new(handler),
        });
        self
    }

    /// Number of declared handlers
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Check whether no handler was declared
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Validate every declaration and erase the subscriber type.
    pub(crate) fn into_bindings(self) -> Result<Vec<Binding>> {
        let subscriber = S::subscriber_name();
        let mut bindings = Vec::with_capacity(self.candidates.len());

        for Candidate { decl, invoke } in self.candidates {
            let (event_type, event_name) = decl.validate(subscriber)?;

            let erased: Invoker =
                Arc::new(move |instance: &(dyn Any + Send + Sync), envelope: &Envelope| {
                    match instance.downcast_ref::<S>() {
                        Some(subscriber) => invoke(subscriber, envelope),
                        None => Err(HandlerError::failed("subscriber type mismatch")),
                    }
                });

            bindings.push(Binding {
                event_type,
                event_name,
                handler: decl.name,
                invoke: erased,
            });
        }

        Ok(bindings)
    }
}

impl<S> Debug for HandlerTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.candidates.iter().map(|c| &c.decl))
            .finish()
    }
}
