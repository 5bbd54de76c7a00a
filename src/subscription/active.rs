//! The set of currently subscribed instances.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::event::Target;
use crate::registry::ResolvedHandlers;
use crate::subscription::Subscriber;

/// One subscribed instance.
///
/// Holds the instance weakly; the coordinator never keeps a subscriber alive.
pub struct ActiveSubscriber {
    key: usize,
    type_id: TypeId,
    name: &'static str,
    instance: Weak<dyn Any + Send + Sync>,
    handlers: Arc<ResolvedHandlers>,
}

impl ActiveSubscriber {
    /// Create an entry for `subscriber` with its resolved handlers
    pub fn new<S: Subscriber>(subscriber: &Arc<S>, handlers: Arc<ResolvedHandlers>) -> Self {
        let erased: Arc<dyn Any + Send + Sync> = subscriber.clone();
        Self {
            key: Self::key_of(subscriber),
            type_id: TypeId::of::<S>(),
            name: S::subscriber_name(),
            instance: Arc::downgrade(&erased),
            handlers,
        }
    }

    /// Identity key of an instance
    pub fn key_of<S>(subscriber: &Arc<S>) -> usize {
        Arc::as_ptr(subscriber) as *const () as usize
    }

    /// Identity key of this entry
    pub fn key(&self) -> usize {
        self.key
    }

    /// Subscriber type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Subscriber type id
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Resolved handlers of the subscriber type
    pub fn handlers(&self) -> &Arc<ResolvedHandlers> {
        &self.handlers
    }

    /// Whether an event addressed to `target` is for this subscriber.
    ///
    /// Broadcasts match everyone; targeted events match by type only.
    pub fn matches(&self, target: Option<Target>) -> bool {
        match target {
            Some(target) => target.type_id() == self.type_id,
            None => true,
        }
    }

    /// Whether the instance is still alive
    pub fn is_alive(&self) -> bool {
        self.instance.strong_count() > 0
    }

    /// Strong reference to the instance, if still alive
    pub fn upgrade(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.instance.upgrade()
    }

    /// Non-owning reference to the instance
    pub fn instance(&self) -> Weak<dyn Any + Send + Sync> {
        self.instance.clone()
    }
}

impl fmt::Debug for ActiveSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSubscriber")
            .field("key", &format_args!("{:#x}", self.key))
            .field("name", &self.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Insertion-ordered set of subscribed instances, unique by identity.
#[derive(Debug, Default)]
pub struct ActiveSet {
    entries: Vec<ActiveSubscriber>,
}

impl ActiveSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns false if the same instance is already present.
    pub fn insert(&mut self, entry: ActiveSubscriber) -> bool {
        if self.contains(entry.key) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove the entry with `key`. Returns false if it was not present.
    pub fn remove(&mut self, key: usize) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        self.entries.len() != before
    }

    /// Check membership by identity key
    pub fn contains(&self, key: usize) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Drop entries whose instance no longer exists. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(ActiveSubscriber::is_alive);
        before - self.entries.len()
    }

    /// Iterate entries in subscription order
    pub fn iter(&self) -> impl Iterator<Item = &ActiveSubscriber> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
