//! Builder pattern for constructing EventCoordinator instances.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::coordinator::config::CoordinatorConfig;
use crate::coordinator::queue::PendingQueue;
use crate::coordinator::{EventCoordinator, Shared, State};
use crate::dispatcher::{MainThread, MainThreadScheduler};
use crate::registry::{DashMapRegistry, HandlerRegistry};
use crate::subscription::ActiveSet;
use crate::task::TaskRunner;
use crate::Result;

/// Builder for creating EventCoordinator instances
#[derive(Debug)]
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    registry: Option<Arc<dyn HandlerRegistry>>,
    scheduler: Option<Arc<dyn MainThreadScheduler>>,
    runtime: Option<Handle>,
}

impl CoordinatorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CoordinatorConfig::default(),
            registry: None,
            scheduler: None,
            runtime: None,
        }
    }

    /// Use a custom configuration
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Configure the coordinator
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(CoordinatorConfig) -> CoordinatorConfig,
    {
        self.config = f(self.config);
        self
    }

    /// Use a custom handler registry
    pub fn registry(mut self, registry: Arc<dyn HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a custom main-thread scheduler
    pub fn scheduler(mut self, scheduler: Arc<dyn MainThreadScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Run background tasks on `handle` instead of the current runtime
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the EventCoordinator.
    ///
    /// Without a custom scheduler this spawns a [`MainThread`]. Without a
    /// runtime handle the current tokio runtime is used if there is one;
    /// otherwise the coordinator has no task runner.
    pub fn build(self) -> Result<EventCoordinator> {
        debug!("Building EventCoordinator");

        let registry = self.registry.unwrap_or_else(|| {
            debug!("Creating default DashMapRegistry");
            Arc::new(DashMapRegistry::with_capacity(self.config.registry_capacity))
        });

        let scheduler: Arc<dyn MainThreadScheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(MainThread::spawn(self.config.main_thread_name.clone())?),
        };

        let runner = self
            .runtime
            .or_else(|| Handle::try_current().ok())
            .map(TaskRunner::new);
        if runner.is_none() {
            debug!("No tokio runtime available, background tasks disabled");
        }

        let state = State {
            pending: PendingQueue::with_capacity(self.config.queue_capacity),
            active: ActiveSet::new(),
        };

        let coordinator = EventCoordinator {
            shared: Arc::new(Shared {
                config: self.config,
                state: Mutex::new(state),
                registry,
                scheduler,
                runner,
                is_shutting_down: AtomicBool::new(false),
            }),
        };

        info!("EventCoordinator built");
        Ok(coordinator)
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
