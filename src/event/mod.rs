//! Core event types.
//!
//! An [`Event`] is a notification value: where it goes ([`Target`]), how long
//! it may wait for a subscriber ([`Retention`]), which thread runs its
//! handlers ([`Affinity`]), a small untyped payload, and a typed variant body.
//!
//! The variant type is the dispatch key. A handler bound to `Event<Progress>`
//! only ever sees events whose variant is exactly `Progress`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use std::any::TypeId;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

use crate::subscription::Subscriber;

pub mod builder;
pub mod envelope;
pub mod metadata;

pub use builder::EventBuilder;
pub use envelope::Envelope;
pub use metadata::EventMetadata;

/// Trait implemented by event variant bodies.
///
/// # Example
///
/// ```rust
/// use tokio_courier::Variant;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct DownloadFinished {
///     bytes: u64,
/// }
///
/// impl Variant for DownloadFinished {
///     fn variant_name() -> &'static str {
///         "DownloadFinished"
///     }
/// }
/// ```
pub trait Variant: Send + Sync + Debug + 'static {
    /// Stable, human-readable name used in logs.
    fn variant_name() -> &'static str
    where
        Self: Sized;

    /// The dispatch key for this variant.
    fn type_id() -> TypeId
    where
        Self: Sized,
    {
        TypeId::of::<Self>()
    }
}

/// The plain variant, carrying nothing beyond the event payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Notice;

impl Variant for Notice {
    fn variant_name() -> &'static str {
        "Notice"
    }
}

/// How an event waits for subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Retention {
    /// Queued until the first sweep that finds a matching subscriber.
    #[default]
    Keep,
    /// Like `Keep`, but replaces any queued latest-only event with the same target.
    LatestOnly,
    /// Delivered to the subscribers active at post time, never queued.
    OneShot,
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retention::Keep => f.write_str("keep"),
            Retention::LatestOnly => f.write_str("latest-only"),
            Retention::OneShot => f.write_str("one-shot"),
        }
    }
}

/// Thread on which handlers for an event run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Affinity {
    /// Scheduled onto the main-thread scheduler.
    #[default]
    MainThread,
    /// Run inline by the thread that triggered delivery.
    SourceThread,
}

/// Subscriber type an event is addressed to.
///
/// Equality and hashing use the type id only.
#[derive(Clone, Copy)]
pub struct Target {
    type_id: TypeId,
    name: &'static str,
}

impl Target {
    /// Target for subscriber type `S`
    pub fn of<S: Subscriber>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }

    /// Type id of the targeted subscriber type
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name of the targeted subscriber type
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One notification.
///
/// Built with [`Event::to_everyone`] or [`Event::to`], immutable afterwards.
#[derive(Debug, Clone)]
pub struct Event<V = Notice> {
    pub(crate) target: Option<Target>,
    pub(crate) retention: Retention,
    pub(crate) affinity: Affinity,
    pub(crate) message: Option<String>,
    pub(crate) number: Option<Number>,
    pub(crate) extra: Map<String, Value>,
    pub(crate) data: Option<Value>,
    pub(crate) variant: V,
    pub(crate) metadata: EventMetadata,
}

impl Event<Notice> {
    /// Start building a broadcast event
    pub fn to_everyone() -> EventBuilder<Notice> {
        EventBuilder::new(None)
    }

    /// Start building an event addressed to subscribers of type `S`
    pub fn to<S: Subscriber>() -> EventBuilder<Notice> {
        EventBuilder::new(Some(Target::of::<S>()))
    }
}

impl<V> Event<V> {
    pub(crate) fn with_variant(target: Option<Target>, variant: V) -> Self {
        Self {
            target,
            retention: Retention::default(),
            affinity: Affinity::default(),
            message: None,
            number: None,
            extra: Map::new(),
            data: None,
            variant,
            metadata: EventMetadata::new(),
        }
    }

    /// Addressed subscriber type, `None` for broadcast
    pub fn target(&self) -> Option<Target> {
        self.target
    }

    /// Check whether this event is a broadcast
    pub fn is_broadcast(&self) -> bool {
        self.target.is_none()
    }

    /// Retention policy
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Thread affinity
    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    /// Whether handlers must run on the main-thread scheduler
    pub fn uses_main_thread(&self) -> bool {
        self.affinity == Affinity::MainThread
    }

    /// Typed variant body
    pub fn variant(&self) -> &V {
        &self.variant
    }

    /// Diagnostic metadata
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Message, if set
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Check whether a message is set
    pub fn has_message(&self) -> bool {
        self.message.is_some()
    }

    /// Number, if set
    pub fn number(&self) -> Option<&Number> {
        self.number.as_ref()
    }

    /// Check whether a number is set
    pub fn has_number(&self) -> bool {
        self.number.is_some()
    }

    /// Number as an integer, or 0 when absent
    pub fn int(&self) -> i64 {
        self.int_or(0)
    }

    /// Number as an integer, or `default` when absent. Floats truncate.
    pub fn int_or(&self, default: i64) -> i64 {
        self.number
            .as_ref()
            .and_then(|n| {
                n.as_i64()
                    .or_else(|| n.as_u64().map(|u| u as i64))
                    .or_else(|| n.as_f64().map(|f| f as i64))
            })
            .unwrap_or(default)
    }

    /// The full extra map
    pub fn extras(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Raw extra value for `key`
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Check whether `key` is present in the extra map
    pub fn has_extra(&self, key: &str) -> bool {
        self.extra.contains_key(key)
    }

    /// Boolean extra, or `default` when missing or of another type
    pub fn bool_extra(&self, key: &str, default: bool) -> bool {
        self.extra.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Integer extra, or `default` when missing or of another type
    pub fn i64_extra(&self, key: &str, default: i64) -> i64 {
        self.extra.get(key).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Float extra, or `default` when missing or of another type
    pub fn f64_extra(&self, key: &str, default: f64) -> f64 {
        self.extra.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// String extra
    pub fn str_extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Raw data slot
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Decode the data slot into `T`
    pub fn data_as<T: DeserializeOwned>(&self) -> crate::Result<Option<T>> {
        match &self.data {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }
}

impl<V: PartialEq> PartialEq for Event<V> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
            && self.retention == other.retention
            && self.affinity == other.affinity
            && self.message == other.message
            && self.number == other.number
            && self.extra == other.extra
            && self.data == other.data
            && self.variant == other.variant
    }
}

impl<V: Variant> fmt::Display for Event<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{target=", V::variant_name())?;
        match &self.target {
            Some(target) => write!(f, "'{}'", target.name())?,
            None => f.write_str("everyone")?,
        }
        write!(f, ", retention={}", self.retention)?;
        if let Some(number) = &self.number {
            write!(f, ", number={}", number)?;
        }
        if let Some(message) = &self.message {
            write!(f, ", message='{}'", message)?;
        }
        if !self.extra.is_empty() {
            write!(f, ", extra={}", Value::Object(self.extra.clone()))?;
        }
        if let Some(data) = &self.data {
            write!(f, ", data={}", data)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::HandlerTable;

    #[derive(Debug)]
    struct Screen;

    impl Subscriber for Screen {
        fn handlers(_table: &mut HandlerTable<Self>) {}
    }

    #[derive(Debug)]
    struct Sidebar;

    impl Subscriber for Sidebar {
        fn handlers(_table: &mut HandlerTable<Self>) {}
    }

    #[test]
    fn test_target_equality_is_by_type() {
        assert_eq!(Target::of::<Screen>(), Target::of::<Screen>());
        assert_ne!(Target::of::<Screen>(), Target::of::<Sidebar>());
        assert!(Target::of::<Screen>().name().ends_with("Screen"));
    }

    #[test]
    fn test_defaults() {
        let event = Event::to_everyone().build();
        assert!(event.is_broadcast());
        assert_eq!(event.retention(), Retention::Keep);
        assert!(event.uses_main_thread());
        assert!(!event.has_message());
        assert!(!event.has_number());
        assert_eq!(event.int(), 0);
        assert_eq!(event.int_or(7), 7);
    }

    #[test]
    fn test_int_truncates_floats() {
        let event = Event::to_everyone()
            .with_number(Number::from_f64(41.9).unwrap())
            .build();
        assert_eq!(event.int(), 41);
    }

    #[test]
    fn test_extra_getters() {
        let event = Event::to::<Screen>()
            .put_extra("done", true)
            .put_extra("count", 3)
            .put_extra("ratio", 0.5)
            .put_extra("label", "upload")
            .build();

        assert!(event.has_extra("done"));
        assert!(!event.has_extra("missing"));
        assert!(event.bool_extra("done", false));
        assert_eq!(event.i64_extra("count", 0), 3);
        assert_eq!(event.f64_extra("ratio", 0.0), 0.5);
        assert_eq!(event.str_extra("label"), Some("upload"));
        // Wrong type falls back to the default
        assert_eq!(event.i64_extra("label", -1), -1);
    }

    #[test]
    fn test_data_as() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct Row {
            id: u32,
        }

        let event = Event::to_everyone()
            .with_data(serde_json::json!({ "id": 9 }))
            .build();
        assert_eq!(event.data_as::<Row>().unwrap(), Some(Row { id: 9 }));
        assert!(event.data_as::<String>().is_err());

        let empty = Event::to_everyone().build();
        assert_eq!(empty.data_as::<Row>().unwrap(), None);
    }

    #[test]
    fn test_structural_equality_ignores_metadata() {
        let a = Event::to::<Screen>().latest_only().with_number(2).build();
        let b = Event::to::<Screen>().latest_only().with_number(2).build();
        assert_ne!(a.metadata().event_id, b.metadata().event_id);
        assert_eq!(a, b);

        let c = Event::to::<Screen>().with_number(2).build();
        assert_ne!(a, c);
    }

    #[test]
    fn test_display() {
        let event = Event::to::<Screen>()
            .latest_only()
            .with_number(5)
            .with_message("halfway")
            .build();
        let text = event.to_string();
        assert!(text.starts_with("Notice{target='"));
        assert!(text.contains("retention=latest-only"));
        assert!(text.contains("number=5"));
        assert!(text.contains("message='halfway'"));
    }
}
