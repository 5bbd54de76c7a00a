//! Pending events waiting for a matching subscriber.

use serde_json::Number;
use std::collections::VecDeque;

use crate::event::{Envelope, Retention, Target};

/// FIFO of undelivered events.
///
/// Keeps at most one latest-only event per target; one-shot events never
/// enter the queue.
#[derive(Debug, Default)]
pub struct PendingQueue {
    events: VecDeque<Envelope>,
}

impl PendingQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue with room for `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an event.
    ///
    /// A latest-only event replaces the queued latest-only event with the
    /// same target, which is returned. One-shot events are refused and
    /// handed back.
    pub fn push(&mut self, envelope: Envelope) -> Option<Envelope> {
        match envelope.retention() {
            Retention::OneShot => Some(envelope),
            Retention::Keep => {
                self.events.push_back(envelope);
                None
            }
            Retention::LatestOnly => {
                let target = envelope.target();
                let replaced = self
                    .events
                    .iter()
                    .position(|e| e.retention() == Retention::LatestOnly && e.target() == target)
                    .and_then(|index| self.events.remove(index));
                self.events.push_back(envelope);
                replaced
            }
        }
    }

    /// Remove every event addressed to `target` (`None` means broadcasts).
    ///
    /// Returns how many were removed.
    pub fn invalidate(&mut self, target: Option<Target>) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.target() != target);
        before - self.events.len()
    }

    /// Check for any event addressed exactly to `target`.
    ///
    /// A concrete target does not match queued broadcasts; pass `None` to
    /// ask about those.
    pub fn has_event_for(&self, target: Option<Target>) -> bool {
        self.events.iter().any(|e| e.target() == target)
    }

    /// Check for an event addressed to `target` carrying exactly `number`
    pub fn has_event_with_number(&self, target: Option<Target>, number: &Number) -> bool {
        self.events
            .iter()
            .any(|e| e.target() == target && e.number() == Some(number))
    }

    /// Take, in queue order, every event that can be delivered now.
    ///
    /// Broadcasts are always taken. A targeted event is taken when
    /// `has_recipient` reports a matching subscriber; the rest stay queued
    /// in their original order.
    pub fn take_deliverable<F>(&mut self, mut has_recipient: F) -> Vec<Envelope>
    where
        F: FnMut(Target) -> bool,
    {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.events.len());

        for envelope in self.events.drain(..) {
            let deliverable = match envelope.target() {
                None => true,
                Some(target) => has_recipient(target),
            };
            if deliverable {
                taken.push(envelope);
            } else {
                kept.push_back(envelope);
            }
        }

        self.events = kept;
        taken
    }

    /// Drop everything. Returns how many events were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.events.len();
        self.events.clear();
        dropped
    }

    /// Iterate queued events in order
    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.events.iter()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::subscription::{HandlerTable, Subscriber};

    struct Screen;

    impl Subscriber for Screen {
        fn handlers(_table: &mut HandlerTable<Self>) {}
    }

    struct Sidebar;

    impl Subscriber for Sidebar {
        fn handlers(_table: &mut HandlerTable<Self>) {}
    }

    fn numbers(queue: &PendingQueue) -> Vec<i64> {
        queue
            .iter()
            .map(|e| e.number().and_then(Number::as_i64).unwrap_or(-1))
            .collect()
    }

    #[test]
    fn test_latest_only_replaces_same_target() {
        let mut queue = PendingQueue::new();
        let first = Envelope::new(Event::to::<Screen>().latest_only().with_number(1).build());
        let second = Envelope::new(Event::to::<Screen>().latest_only().with_number(2).build());

        assert!(queue.push(first).is_none());
        let replaced = queue.push(second).unwrap();

        assert_eq!(replaced.number().and_then(Number::as_i64), Some(1));
        assert_eq!(numbers(&queue), vec![2]);
    }

    #[test]
    fn test_latest_only_is_per_target() {
        let mut queue = PendingQueue::new();
        queue.push(Envelope::new(Event::to::<Screen>().latest_only().with_number(1).build()));
        queue.push(Envelope::new(Event::to::<Sidebar>().latest_only().with_number(2).build()));
        queue.push(Envelope::new(Event::to_everyone().latest_only().with_number(3).build()));
        queue.push(Envelope::new(Event::to_everyone().latest_only().with_number(4).build()));

        assert_eq!(numbers(&queue), vec![1, 2, 4]);
    }

    #[test]
    fn test_latest_only_leaves_kept_events() {
        let mut queue = PendingQueue::new();
        queue.push(Envelope::new(Event::to::<Screen>().with_number(1).build()));
        queue.push(Envelope::new(Event::to::<Screen>().latest_only().with_number(2).build()));
        queue.push(Envelope::new(Event::to::<Screen>().latest_only().with_number(3).build()));

        assert_eq!(numbers(&queue), vec![1, 3]);
    }

    #[test]
    fn test_one_shot_is_refused() {
        let mut queue = PendingQueue::new();
        let refused = queue.push(Envelope::new(Event::to::<Screen>().one_shot().build()));

        assert!(refused.is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let mut queue = PendingQueue::new();
        queue.push(Envelope::new(Event::to_everyone().with_number(1).build()));
        queue.push(Envelope::new(Event::to::<Screen>().with_number(2).build()));
        queue.push(Envelope::new(Event::to::<Screen>().with_number(3).build()));

        assert_eq!(queue.invalidate(Some(Target::of::<Sidebar>())), 0);
        assert_eq!(queue.invalidate(Some(Target::of::<Screen>())), 2);
        assert_eq!(numbers(&queue), vec![1]);
        assert_eq!(queue.invalidate(None), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queries() {
        let mut queue = PendingQueue::new();
        queue.push(Envelope::new(Event::to::<Screen>().with_number(7).build()));

        let screen = Some(Target::of::<Screen>());
        assert!(queue.has_event_for(screen));
        assert!(!queue.has_event_for(None));
        assert!(queue.has_event_with_number(screen, &Number::from(7)));
        assert!(!queue.has_event_with_number(screen, &Number::from(8)));
        assert!(!queue.has_event_with_number(Some(Target::of::<Sidebar>()), &Number::from(7)));
    }

    #[test]
    fn test_take_deliverable_keeps_order() {
        let mut queue = PendingQueue::new();
        queue.push(Envelope::new(Event::to::<Sidebar>().with_number(1).build()));
        queue.push(Envelope::new(Event::to::<Screen>().with_number(2).build()));
        queue.push(Envelope::new(Event::to_everyone().with_number(3).build()));
        queue.push(Envelope::new(Event::to::<Sidebar>().with_number(4).build()));
        queue.push(Envelope::new(Event::to::<Screen>().with_number(5).build()));

        let screen = Target::of::<Screen>();
        let taken = queue.take_deliverable(|target| target == screen);

        let taken: Vec<i64> = taken
            .iter()
            .filter_map(|e| e.number().and_then(Number::as_i64))
            .collect();
        assert_eq!(taken, vec![2, 3, 5]);
        assert_eq!(numbers(&queue), vec![1, 4]);
    }
}
