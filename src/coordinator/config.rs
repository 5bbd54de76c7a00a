//! Configuration for the event coordinator.

/// Configuration for the event coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Initial capacity of the handler cache (subscriber types)
    pub registry_capacity: usize,

    /// Initial capacity of the pending-event queue
    pub queue_capacity: usize,

    /// Name of the thread spawned by the default main-thread scheduler
    pub main_thread_name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            registry_capacity: 64,
            queue_capacity: 32,
            main_thread_name: "courier-main".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set handler cache capacity
    pub fn registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    /// Set pending queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the main thread name
    pub fn main_thread_name(mut self, name: impl Into<String>) -> Self {
        self.main_thread_name = name.into();
        self
    }
}

/// Preset configurations
impl CoordinatorConfig {
    /// Configuration for testing
    pub fn test() -> Self {
        Self::default()
            .registry_capacity(8)
            .queue_capacity(8)
            .main_thread_name("courier-test-main")
    }
}
