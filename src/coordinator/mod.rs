//! The main EventCoordinator implementation.
//!
//! The coordinator is the primary interface of the crate. It keeps the queue
//! of undelivered events and the set of active subscribers, and every change
//! to either triggers a delivery sweep: broadcasts go to everyone who is
//! subscribed, targeted events wait until an instance of their target type
//! is subscribed. Handler calls are routed to the main-thread scheduler or
//! run on the calling thread, depending on the event's affinity.

use serde_json::Number;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error, info, trace};

use crate::dispatcher::{lock, MainThreadScheduler};
use crate::error::{DeliveryContext, HandlerError};
use crate::event::{Affinity, Envelope, Event, Retention, Target, Variant};
use crate::registry::{Binding, HandlerRegistry};
use crate::subscription::{ActiveSet, ActiveSubscriber, Subscriber};
use crate::task::TaskRunner;
use crate::{Error, Result};

pub mod builder;
pub mod config;
pub mod queue;

pub use builder::CoordinatorBuilder;
pub use config::CoordinatorConfig;
pub use queue::PendingQueue;

/// Coordinates event delivery between posters and subscribers.
///
/// Cloning is cheap; clones share the same queue and subscribers.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tokio_courier::{Event, EventCoordinator, HandlerTable, ManualScheduler, Subscriber};
///
/// struct Screen;
///
/// impl Subscriber for Screen {
///     fn handlers(table: &mut HandlerTable<Self>) {
///         table.on::<tokio_courier::Notice, _>("on_event", |_screen, event| {
///             println!("progress {}", event.int());
///             Ok(())
///         });
///     }
/// }
///
/// # fn main() -> tokio_courier::Result<()> {
/// let scheduler = Arc::new(ManualScheduler::new());
/// let coordinator = EventCoordinator::builder()
///     .scheduler(scheduler.clone())
///     .build()?;
///
/// // Nobody listens yet, so the event waits.
/// Event::to::<Screen>().latest_only().with_number(40).post(&coordinator)?;
///
/// let screen = Arc::new(Screen);
/// coordinator.subscribe(&screen)?;
/// scheduler.run_pending();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventCoordinator {
    pub(crate) shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub(crate) config: CoordinatorConfig,
    pub(crate) state: Mutex<State>,
    pub(crate) registry: Arc<dyn HandlerRegistry>,
    pub(crate) scheduler: Arc<dyn MainThreadScheduler>,
    pub(crate) runner: Option<TaskRunner>,
    pub(crate) is_shutting_down: AtomicBool,
}

pub(crate) struct State {
    pub(crate) pending: PendingQueue,
    pub(crate) active: ActiveSet,
}

impl EventCoordinator {
    /// Create a new EventCoordinator builder
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Post an event.
    ///
    /// Keep and latest-only events are queued and delivered as soon as a
    /// matching subscriber is active. One-shot events go to whoever is
    /// subscribed right now and are otherwise dropped.
    pub fn post<V: Variant>(&self, event: Event<V>) -> Result<()> {
        self.post_envelope(Envelope::new(event))
    }

    /// Post an already type-erased event
    pub fn post_envelope(&self, envelope: Envelope) -> Result<()> {
        self.ensure_running()?;

        trace!(
            event_id = %envelope.event_id(),
            event_type = envelope.event_type(),
            retention = %envelope.retention(),
            "Posting event"
        );

        let inline = {
            let mut state = lock(&self.shared.state);
            match envelope.retention() {
                Retention::OneShot => self.deliver_now(&mut state, &envelope),
                Retention::Keep | Retention::LatestOnly => {
                    if let Some(replaced) = state.pending.push(envelope) {
                        debug!(
                            event_id = %replaced.event_id(),
                            event_type = replaced.event_type(),
                            "Replaced latest-only event"
                        );
                    }
                    self.deliver_pending(&mut state)
                }
            }
        };

        run_inline(inline);
        Ok(())
    }

    /// Subscribe an instance.
    ///
    /// The first subscription of a type resolves its handlers; a malformed
    /// declaration fails with [`Error::Configuration`] and the instance is
    /// not added. Subscribing an instance twice has no effect. Queued events
    /// the instance can now receive are delivered before this returns (or
    /// scheduled, for main-thread events).
    ///
    /// The coordinator keeps only a weak reference: dropping the last `Arc`
    /// ends the subscription.
    pub fn subscribe<S: Subscriber>(&self, subscriber: &Arc<S>) -> Result<()> {
        self.ensure_running()?;

        let handlers = self.shared.registry.resolve::<S>()?;

        let inline = {
            let mut state = lock(&self.shared.state);
            if !state.active.insert(ActiveSubscriber::new(subscriber, handlers)) {
                trace!(subscriber = S::subscriber_name(), "Already subscribed");
                return Ok(());
            }
            debug!(
                subscriber = S::subscriber_name(),
                active = state.active.len(),
                "Subscribed"
            );
            self.deliver_pending(&mut state)
        };

        run_inline(inline);
        Ok(())
    }

    /// Unsubscribe an instance. Returns whether it was subscribed.
    ///
    /// Handler calls already handed to the main thread still run.
    pub fn unsubscribe<S: Subscriber>(&self, subscriber: &Arc<S>) -> bool {
        let mut state = lock(&self.shared.state);
        let removed = state.active.remove(ActiveSubscriber::key_of(subscriber));
        state.active.prune();
        if removed {
            debug!(subscriber = S::subscriber_name(), "Unsubscribed");
        }
        removed
    }

    /// Check whether an instance is subscribed
    pub fn is_subscribed<S: Subscriber>(&self, subscriber: &Arc<S>) -> bool {
        lock(&self.shared.state)
            .active
            .contains(ActiveSubscriber::key_of(subscriber))
    }

    /// Drop queued events addressed to `target` (`None` drops broadcasts).
    ///
    /// Returns how many events were dropped.
    pub fn invalidate(&self, target: Option<Target>) -> usize {
        let dropped = lock(&self.shared.state).pending.invalidate(target);
        if dropped > 0 {
            debug!(target = ?target, dropped, "Invalidated queued events");
        }
        dropped
    }

    /// Drop queued events addressed to subscriber type `S`
    pub fn invalidate_for<S: Subscriber>(&self) -> usize {
        self.invalidate(Some(Target::of::<S>()))
    }

    /// Check whether an event addressed to `S` is waiting.
    ///
    /// Queued broadcasts are not counted, although subscribing an `S` would
    /// receive them. Use [`pending_len`](Self::pending_len) to ask whether
    /// anything at all is waiting.
    pub fn has_event<S: Subscriber>(&self) -> bool {
        lock(&self.shared.state)
            .pending
            .has_event_for(Some(Target::of::<S>()))
    }

    /// Check whether an event addressed to `S` carrying exactly `number` is waiting.
    ///
    /// Like [`has_event`](Self::has_event), broadcasts are not counted.
    pub fn has_event_with_number<S: Subscriber>(&self, number: impl Into<Number>) -> bool {
        let number = number.into();
        lock(&self.shared.state)
            .pending
            .has_event_with_number(Some(Target::of::<S>()), &number)
    }

    /// Number of queued events
    pub fn pending_len(&self) -> usize {
        lock(&self.shared.state).pending.len()
    }

    /// Number of active subscribers
    pub fn active_len(&self) -> usize {
        let mut state = lock(&self.shared.state);
        state.active.prune();
        state.active.len()
    }

    /// The background task runner
    pub fn runner(&self) -> Result<&TaskRunner> {
        self.shared.runner.as_ref().ok_or(Error::NoRuntime)
    }

    /// Run a blocking task in the background
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.runner()?.execute(task);
        Ok(())
    }

    /// Run a blocking task in the background, marking `tag` as running while it does
    pub fn execute_tagged<F>(&self, task: F, tag: impl Into<String>) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.runner()?.execute_tagged(task, tag)
    }

    /// Run a blocking task under `tag` unless one is already running
    pub fn execute_if_idle<F>(&self, task: F, tag: impl Into<String>) -> Result<bool>
    where
        F: FnOnce() + Send + 'static,
    {
        self.runner()?.execute_if_idle(task, tag)
    }

    /// Check whether a task with `tag` is running.
    ///
    /// Always false without a task runner.
    pub fn is_running(&self, tag: &str) -> bool {
        self.shared
            .runner
            .as_ref()
            .map_or(false, |runner| runner.is_running(tag))
    }

    /// The main-thread scheduler
    pub fn scheduler(&self) -> &Arc<dyn MainThreadScheduler> {
        &self.shared.scheduler
    }

    /// The handler registry
    pub fn registry(&self) -> &Arc<dyn HandlerRegistry> {
        &self.shared.registry
    }

    /// The active configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Check if the coordinator is shutting down
    pub fn is_shutting_down(&self) -> bool {
        self.shared.is_shutting_down.load(Ordering::Relaxed)
    }

    /// Stop accepting posts and subscriptions and drop all state.
    ///
    /// Handler calls already handed to the main thread still run. Affects
    /// every clone.
    pub fn shutdown(&self) -> Result<()> {
        info!("Shutting down EventCoordinator");
        self.shared.is_shutting_down.store(true, Ordering::Relaxed);

        let mut state = lock(&self.shared.state);
        let dropped = state.pending.clear();
        let subscribers = state.active.len();
        state.active = ActiveSet::new();

        info!(dropped, subscribers, "EventCoordinator shutdown complete");
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    /// Deliver every queued event that has a recipient now.
    fn deliver_pending(&self, state: &mut State) -> Vec<Dispatch> {
        let State { pending, active } = state;
        active.prune();

        let mut inline = Vec::new();
        if pending.is_empty() || active.is_empty() {
            return inline;
        }

        let delivered =
            pending.take_deliverable(|target| active.iter().any(|s| s.matches(Some(target))));
        for envelope in &delivered {
            self.fan_out(active, envelope, &mut inline);
        }
        inline
    }

    /// Deliver a one-shot event to the current subscribers only.
    fn deliver_now(&self, state: &mut State, envelope: &Envelope) -> Vec<Dispatch> {
        state.active.prune();

        let mut inline = Vec::new();
        if self.fan_out(&state.active, envelope, &mut inline) == 0 {
            debug!(
                event_id = %envelope.event_id(),
                event_type = envelope.event_type(),
                "One-shot event had no recipient, dropped"
            );
        }
        inline
    }

    /// Route one event to every matching subscriber's handlers.
    ///
    /// Main-thread calls are scheduled right away; source-thread calls are
    /// collected into `inline` for the caller to run once the lock is gone.
    /// Returns the number of matching subscribers.
    fn fan_out(
        &self,
        active: &ActiveSet,
        envelope: &Envelope,
        inline: &mut Vec<Dispatch>,
    ) -> usize {
        let mut recipients = 0;

        for subscriber in active.iter().filter(|s| s.matches(envelope.target())) {
            recipients += 1;

            for binding in subscriber.handlers().for_event(envelope.type_id()) {
                let dispatch = Dispatch {
                    instance: subscriber.instance(),
                    binding: binding.clone(),
                    envelope: envelope.clone(),
                    subscriber: subscriber.name(),
                };

                match envelope.affinity() {
                    Affinity::MainThread => {
                        self.shared.scheduler.schedule(Box::new(move || dispatch.run()))
                    }
                    Affinity::SourceThread => inline.push(dispatch),
                }
            }
        }

        trace!(
            event_id = %envelope.event_id(),
            event_type = envelope.event_type(),
            recipients,
            "Event routed"
        );
        recipients
    }
}

impl std::fmt::Debug for EventCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("EventCoordinator")
            .field("pending", &state.pending.len())
            .field("active", &state.active.len())
            .field("scheduler", &self.shared.scheduler)
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

/// One handler call for one subscriber instance
struct Dispatch {
    instance: Weak<dyn Any + Send + Sync>,
    binding: Binding,
    envelope: Envelope,
    subscriber: &'static str,
}

impl Dispatch {
    fn run(self) {
        let context = DeliveryContext {
            event_id: self.envelope.event_id(),
            posted_at: self.envelope.timestamp(),
            event_type: self.envelope.event_type(),
            subscriber: self.subscriber,
            handler: self.binding.handler,
        };

        let Some(instance) = self.instance.upgrade() else {
            debug!(context = %context, error = %HandlerError::SubscriberGone, "Skipping delivery");
            return;
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            self.binding.invoke(instance.as_ref(), &self.envelope)
        }))
        .unwrap_or_else(|panic| Err(HandlerError::from_panic(panic.as_ref())));

        match result {
            Ok(()) => trace!(context = %context, "Event delivered"),
            Err(e) => error!(context = %context, error = %e, "Handler failed"),
        }
    }
}

fn run_inline(dispatches: Vec<Dispatch>) {
    for dispatch in dispatches {
        dispatch.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::ManualScheduler;
    use crate::subscription::{HandlerDecl, HandlerTable, ParamKind};
    use crate::Notice;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Finished;

    impl Variant for Finished {
        fn variant_name() -> &'static str {
            "Finished"
        }
    }

    #[derive(Default)]
    struct Screen {
        seen: Mutex<Vec<String>>,
    }

    impl Screen {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Subscriber for Screen {
        fn handlers(table: &mut HandlerTable<Self>) {
            table.on::<Notice, _>("on_event", |screen, event| {
                screen.seen.lock().unwrap().push(format!("n{}", event.int()));
                Ok(())
            });
            table.on::<Finished, _>("on_finished", |screen, _event| {
                screen.seen.lock().unwrap().push("finished".to_string());
                Ok(())
            });
        }
    }

    #[derive(Default)]
    struct Sidebar {
        seen: Mutex<Vec<i64>>,
    }

    impl Subscriber for Sidebar {
        fn handlers(table: &mut HandlerTable<Self>) {
            table.on::<Notice, _>("on_event", |sidebar, event| {
                sidebar.seen.lock().unwrap().push(event.int());
                Ok(())
            });
        }
    }

    struct Broken;

    impl Subscriber for Broken {
        fn handlers(table: &mut HandlerTable<Self>) {
            let decl = HandlerDecl::new("on_pair")
                .param(ParamKind::variant::<Notice>())
                .param(ParamKind::other::<String>());
            table.declare(decl, |_broken, _envelope| Ok(()));
        }
    }

    fn coordinator() -> (EventCoordinator, Arc<ManualScheduler>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let coordinator = EventCoordinator::builder()
            .config(CoordinatorConfig::test())
            .scheduler(scheduler.clone())
            .build()
            .unwrap();
        (coordinator, scheduler)
    }

    #[test]
    fn test_queued_until_subscribed() {
        let (coordinator, scheduler) = coordinator();
        Event::to::<Screen>().with_number(1).post(&coordinator).unwrap();
        assert!(coordinator.has_event::<Screen>());
        assert!(coordinator.has_event_with_number::<Screen>(1));

        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();
        assert!(!coordinator.has_event::<Screen>());
        assert!(screen.seen().is_empty());

        scheduler.run_pending();
        assert_eq!(screen.seen(), vec!["n1"]);
    }

    #[test]
    fn test_latest_only_replaces_previous() {
        let (coordinator, scheduler) = coordinator();
        Event::to::<Screen>().latest_only().with_number(1).post(&coordinator).unwrap();
        Event::to::<Screen>().latest_only().with_number(2).post(&coordinator).unwrap();
        assert_eq!(coordinator.pending_len(), 1);

        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();
        scheduler.run_pending();
        assert_eq!(screen.seen(), vec!["n2"]);
    }

    #[test]
    fn test_one_shot_without_subscriber_is_dropped() {
        let (coordinator, scheduler) = coordinator();
        Event::to::<Screen>().one_shot().post(&coordinator).unwrap();
        assert_eq!(coordinator.pending_len(), 0);

        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();
        scheduler.run_pending();
        assert!(screen.seen().is_empty());

        Event::to::<Screen>().one_shot().with_number(5).post(&coordinator).unwrap();
        scheduler.run_pending();
        assert_eq!(screen.seen(), vec!["n5"]);
    }

    #[test]
    fn test_broadcast_reaches_everyone_then_removed() {
        let (coordinator, scheduler) = coordinator();
        let screen = Arc::new(Screen::default());
        let sidebar = Arc::new(Sidebar::default());
        coordinator.subscribe(&screen).unwrap();
        coordinator.subscribe(&sidebar).unwrap();

        Event::to_everyone().with_number(3).post(&coordinator).unwrap();
        scheduler.run_pending();

        assert_eq!(screen.seen(), vec!["n3"]);
        assert_eq!(*sidebar.seen.lock().unwrap(), vec![3]);
        assert_eq!(coordinator.pending_len(), 0);
    }

    #[test]
    fn test_broadcast_waits_for_first_subscriber() {
        let (coordinator, scheduler) = coordinator();
        Event::to_everyone().with_number(9).post(&coordinator).unwrap();
        assert_eq!(coordinator.pending_len(), 1);

        let sidebar = Arc::new(Sidebar::default());
        coordinator.subscribe(&sidebar).unwrap();
        scheduler.run_pending();

        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();
        scheduler.run_pending();

        assert_eq!(*sidebar.seen.lock().unwrap(), vec![9]);
        assert!(screen.seen().is_empty());
    }

    #[test]
    fn test_targeted_event_skips_other_types() {
        let (coordinator, scheduler) = coordinator();
        let sidebar = Arc::new(Sidebar::default());
        coordinator.subscribe(&sidebar).unwrap();

        Event::to::<Screen>().with_number(4).post(&coordinator).unwrap();
        scheduler.run_pending();
        assert!(sidebar.seen.lock().unwrap().is_empty());
        assert!(coordinator.has_event::<Screen>());
    }

    #[test]
    fn test_exact_variant_dispatch() {
        let (coordinator, scheduler) = coordinator();
        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();

        Event::to::<Screen>().variant(Finished).post(&coordinator).unwrap();
        scheduler.run_pending();
        assert_eq!(screen.seen(), vec!["finished"]);

        // Sidebar has no handler for Finished; the event is still consumed.
        let sidebar = Arc::new(Sidebar::default());
        coordinator.subscribe(&sidebar).unwrap();
        Event::to::<Sidebar>().variant(Finished).post(&coordinator).unwrap();
        scheduler.run_pending();
        assert!(sidebar.seen.lock().unwrap().is_empty());
        assert!(!coordinator.has_event::<Sidebar>());
    }

    #[test]
    fn test_fan_out_to_every_instance() {
        let (coordinator, scheduler) = coordinator();
        let first = Arc::new(Screen::default());
        let second = Arc::new(Screen::default());
        coordinator.subscribe(&first).unwrap();
        coordinator.subscribe(&second).unwrap();
        coordinator.subscribe(&second).unwrap();
        assert_eq!(coordinator.active_len(), 2);

        Event::to::<Screen>().with_number(6).post(&coordinator).unwrap();
        scheduler.run_pending();
        assert_eq!(first.seen(), vec!["n6"]);
        assert_eq!(second.seen(), vec!["n6"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let (coordinator, scheduler) = coordinator();
        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();
        assert!(coordinator.unsubscribe(&screen));
        assert!(!coordinator.unsubscribe(&screen));

        Event::to::<Screen>().with_number(1).post(&coordinator).unwrap();
        scheduler.run_pending();
        assert!(screen.seen().is_empty());
        assert!(coordinator.has_event::<Screen>());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let (coordinator, scheduler) = coordinator();
        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();
        drop(screen);

        assert_eq!(coordinator.active_len(), 0);
        Event::to::<Screen>().with_number(1).post(&coordinator).unwrap();
        assert_eq!(scheduler.pending(), 0);
        assert!(coordinator.has_event::<Screen>());
    }

    #[test]
    fn test_has_event_ignores_broadcasts() {
        let (coordinator, scheduler) = coordinator();
        Event::to_everyone().with_number(1).post(&coordinator).unwrap();

        assert!(!coordinator.has_event::<Screen>());
        assert!(!coordinator.has_event_with_number::<Screen>(1));
        assert_eq!(coordinator.pending_len(), 1);

        // Yet a Screen that subscribes still receives it
        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();
        scheduler.run_pending();
        assert_eq!(screen.seen(), vec!["n1"]);
    }

    #[test]
    fn test_invalidate() {
        let (coordinator, _scheduler) = coordinator();
        Event::to::<Screen>().with_number(1).post(&coordinator).unwrap();
        Event::to::<Screen>().with_number(2).post(&coordinator).unwrap();
        Event::to_everyone().post(&coordinator).unwrap();

        assert_eq!(coordinator.invalidate_for::<Sidebar>(), 0);
        assert_eq!(coordinator.invalidate_for::<Screen>(), 2);
        assert_eq!(coordinator.pending_len(), 1);
        assert_eq!(coordinator.invalidate(None), 1);
        assert_eq!(coordinator.pending_len(), 0);
    }

    #[test]
    fn test_bad_declaration_rejected() {
        let (coordinator, _scheduler) = coordinator();
        let broken = Arc::new(Broken);

        let err = coordinator.subscribe(&broken).unwrap_err();
        assert!(err.is_configuration());
        assert!(!coordinator.is_subscribed(&broken));
        assert_eq!(coordinator.active_len(), 0);
    }

    #[test]
    fn test_source_thread_runs_inline() {
        let (coordinator, scheduler) = coordinator();
        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();

        Event::to::<Screen>()
            .use_source_thread()
            .with_number(8)
            .post(&coordinator)
            .unwrap();

        assert_eq!(scheduler.pending(), 0);
        assert_eq!(screen.seen(), vec!["n8"]);
    }

    struct Relay {
        coordinator: EventCoordinator,
    }

    impl Subscriber for Relay {
        fn handlers(table: &mut HandlerTable<Self>) {
            table.on::<Notice, _>("on_event", |relay, event| {
                Event::to::<Sidebar>()
                    .use_source_thread()
                    .with_number(event.int() + 1)
                    .post(&relay.coordinator)
                    .map_err(|e| HandlerError::failed(e.to_string()))
            });
        }
    }

    #[test]
    fn test_source_thread_handler_may_post() {
        let (coordinator, _scheduler) = coordinator();
        let relay = Arc::new(Relay {
            coordinator: coordinator.clone(),
        });
        let sidebar = Arc::new(Sidebar::default());
        coordinator.subscribe(&relay).unwrap();
        coordinator.subscribe(&sidebar).unwrap();

        Event::to::<Relay>().use_source_thread().with_number(1).post(&coordinator).unwrap();
        assert_eq!(*sidebar.seen.lock().unwrap(), vec![2]);
    }

    struct Faulty {
        calls: Mutex<u32>,
    }

    impl Subscriber for Faulty {
        fn handlers(table: &mut HandlerTable<Self>) {
            table.on::<Notice, _>("on_event", |faulty, event| {
                *faulty.calls.lock().unwrap() += 1;
                match event.int() {
                    0 => panic!("handler exploded"),
                    1 => Err(HandlerError::failed("rejected")),
                    _ => Ok(()),
                }
            });
        }
    }

    #[test]
    fn test_handler_failures_are_contained() {
        let (coordinator, scheduler) = coordinator();
        let faulty = Arc::new(Faulty {
            calls: Mutex::new(0),
        });
        coordinator.subscribe(&faulty).unwrap();

        Event::to::<Faulty>().with_number(0).post(&coordinator).unwrap();
        Event::to::<Faulty>().with_number(1).post(&coordinator).unwrap();
        Event::to::<Faulty>().use_source_thread().with_number(0).post(&coordinator).unwrap();
        Event::to::<Faulty>().with_number(2).post(&coordinator).unwrap();
        scheduler.run_pending();

        assert_eq!(*faulty.calls.lock().unwrap(), 4);
    }

    struct Exploding;

    impl Subscriber for Exploding {
        fn handlers(table: &mut HandlerTable<Self>) {
            table.on::<Notice, _>("on_event", |_exploding, _event| panic!("handler exploded"));
        }
    }

    #[test]
    fn test_panicking_inline_handler_does_not_starve_others() {
        let (coordinator, _scheduler) = coordinator();
        let exploding = Arc::new(Exploding);
        let sidebar = Arc::new(Sidebar::default());
        coordinator.subscribe(&exploding).unwrap();
        coordinator.subscribe(&sidebar).unwrap();

        let posted = catch_unwind(AssertUnwindSafe(|| {
            Event::to_everyone()
                .use_source_thread()
                .with_number(12)
                .post(&coordinator)
        }));

        assert!(matches!(posted, Ok(Ok(()))));
        assert_eq!(*sidebar.seen.lock().unwrap(), vec![12]);
        assert_eq!(coordinator.pending_len(), 0);
    }

    #[test]
    fn test_main_thread_affinity() {
        let (coordinator, scheduler) = coordinator();
        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();

        let poster = coordinator.clone();
        thread::spawn(move || {
            Event::to::<Screen>().with_number(1).post(&poster).unwrap();
        })
        .join()
        .unwrap();

        assert!(screen.seen().is_empty());
        assert_eq!(scheduler.pending(), 1);
        scheduler.run_pending();
        assert_eq!(screen.seen(), vec!["n1"]);
    }

    #[test]
    fn test_scheduled_call_skipped_when_subscriber_dropped() {
        let (coordinator, scheduler) = coordinator();
        let screen = Arc::new(Screen::default());
        coordinator.subscribe(&screen).unwrap();
        Event::to::<Screen>().with_number(1).post(&coordinator).unwrap();

        drop(screen);
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(coordinator.active_len(), 0);
    }

    #[test]
    fn test_shutdown_rejects_work() {
        let (coordinator, _scheduler) = coordinator();
        Event::to::<Screen>().post(&coordinator).unwrap();
        coordinator.shutdown().unwrap();

        assert!(coordinator.is_shutting_down());
        assert_eq!(coordinator.pending_len(), 0);
        assert!(Event::to_everyone().post(&coordinator).unwrap_err().is_shutdown());
        let screen = Arc::new(Screen::default());
        assert!(coordinator.subscribe(&screen).unwrap_err().is_shutdown());
    }

    #[test]
    fn test_no_runtime() {
        let (coordinator, _scheduler) = coordinator();
        assert!(matches!(coordinator.execute(|| {}), Err(Error::NoRuntime)));
        assert!(matches!(
            coordinator.execute_tagged(|| {}, "sync"),
            Err(Error::NoRuntime)
        ));
        assert!(!coordinator.is_running("sync"));
    }
}
