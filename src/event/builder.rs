//! Fluent builder for [`Event`] values.

use serde_json::{Map, Number, Value};

use crate::coordinator::EventCoordinator;
use crate::event::{Affinity, Event, Notice, Retention, Target, Variant};
use crate::Result;

/// Builder returned by [`Event::to_everyone`] and [`Event::to`].
///
/// Every setter is optional and chainable.
///
/// ```rust
/// use tokio_courier::{Event, HandlerTable, Retention, Subscriber};
///
/// struct Screen;
///
/// impl Subscriber for Screen {
///     fn handlers(_table: &mut HandlerTable<Self>) {}
/// }
///
/// let event = Event::to::<Screen>()
///     .latest_only()
///     .with_number(42)
///     .with_message("downloading")
///     .build();
///
/// assert_eq!(event.retention(), Retention::LatestOnly);
/// assert_eq!(event.int(), 42);
/// ```
#[derive(Debug)]
pub struct EventBuilder<V = Notice> {
    event: Event<V>,
}

impl EventBuilder<Notice> {
    pub(crate) fn new(target: Option<Target>) -> Self {
        Self {
            event: Event::with_variant(target, Notice),
        }
    }
}

impl<V> EventBuilder<V> {
    /// Replace the variant body, changing the event's dispatch type
    pub fn variant<W: Variant>(self, body: W) -> EventBuilder<W> {
        let Event {
            target,
            retention,
            affinity,
            message,
            number,
            extra,
            data,
            variant: _,
            metadata,
        } = self.event;

        EventBuilder {
            event: Event {
                target,
                retention,
                affinity,
                message,
                number,
                extra,
                data,
                variant: body,
                metadata,
            },
        }
    }

    /// Set the retention policy
    pub fn with_type(mut self, retention: Retention) -> Self {
        self.event.retention = retention;
        self
    }

    /// Shorthand for `with_type(Retention::LatestOnly)`
    pub fn latest_only(self) -> Self {
        self.with_type(Retention::LatestOnly)
    }

    /// Shorthand for `with_type(Retention::OneShot)`
    pub fn one_shot(self) -> Self {
        self.with_type(Retention::OneShot)
    }

    /// Set the number
    pub fn with_number(mut self, number: impl Into<Number>) -> Self {
        self.event.number = Some(number.into());
        self
    }

    /// Set the message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.event.message = Some(message.into());
        self
    }

    /// Replace the extra map
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.event.extra = extra;
        self
    }

    /// Add one extra entry, replacing any previous value for `key`
    pub fn put_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event.extra.insert(key.into(), value.into());
        self
    }

    /// Set the data slot
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.event.data = Some(data.into());
        self
    }

    /// Deliver on the thread that triggers delivery instead of the main thread.
    pub fn use_source_thread(mut self) -> Self {
        self.event.affinity = Affinity::SourceThread;
        self
    }

    /// Record where the event came from (diagnostics only)
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.event.metadata.source = Some(source.into());
        self
    }

    /// Finish the event
    pub fn build(self) -> Event<V> {
        self.event
    }
}

impl<V: Variant> EventBuilder<V> {
    /// Build the event and post it to `coordinator`
    pub fn post(self, coordinator: &EventCoordinator) -> Result<()> {
        coordinator.post(self.build())
    }
}
