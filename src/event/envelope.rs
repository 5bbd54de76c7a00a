//! Type-erased event storage.

use chrono::{DateTime, Utc};
use serde_json::Number;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::event::{Affinity, Event, Retention, Target, Variant};

/// A type-erased wrapper for events.
///
/// The pending queue holds events of many variant types side by side. The
/// envelope keeps the routing fields readable without knowing the variant,
/// while handlers downcast back to the concrete `Event<V>`.
#[derive(Clone)]
pub struct Envelope {
    /// The type-erased `Event<V>`
    payload: Arc<dyn Any + Send + Sync>,

    /// Type ID of the variant `V`
    type_id: TypeId,

    /// Human-readable variant name for debugging
    type_name: &'static str,

    target: Option<Target>,
    retention: Retention,
    affinity: Affinity,
    number: Option<Number>,
    event_id: Uuid,
    timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Wrap an event
    pub fn new<V: Variant>(event: Event<V>) -> Self {
        Self {
            type_id: V::type_id(),
            type_name: V::variant_name(),
            target: event.target,
            retention: event.retention,
            affinity: event.affinity,
            number: event.number.clone(),
            event_id: event.metadata.event_id,
            timestamp: event.metadata.timestamp,
            payload: Arc::new(event),
        }
    }

    /// Variant name
    pub fn event_type(&self) -> &'static str {
        self.type_name
    }

    /// Type ID of the variant
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Addressed subscriber type, `None` for broadcast
    pub fn target(&self) -> Option<Target> {
        self.target
    }

    /// Retention policy
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Thread affinity
    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    /// Number carried by the event
    pub fn number(&self) -> Option<&Number> {
        self.number.as_ref()
    }

    /// Event ID from the metadata
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Creation time of the wrapped event
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Check if this envelope carries variant `V`
    pub fn is<V: Variant>(&self) -> bool {
        self.type_id == TypeId::of::<V>()
    }

    /// Try to downcast to a specific event type
    pub fn downcast_ref<V: Variant>(&self) -> Option<&Event<V>> {
        if self.is::<V>() {
            self.payload.downcast_ref::<Event<V>>()
        } else {
            None
        }
    }

    /// Try to extract the shared event as a specific type
    pub fn try_into_inner<V: Variant>(self) -> Result<Arc<Event<V>>, Self> {
        if !self.is::<V>() {
            return Err(self);
        }
        match Arc::downcast::<Event<V>>(self.payload.clone()) {
            Ok(event) => Ok(event),
            Err(_) => Err(self),
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("type_name", &self.type_name)
            .field("event_id", &self.event_id)
            .field("target", &self.target)
            .field("retention", &self.retention)
            .field("affinity", &self.affinity)
            .finish()
    }
}
