//! Event metadata for tracking and logging.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Metadata stamped on each event when it is built.
///
/// Metadata is for diagnostics only; it takes no part in event equality
/// or in queue retention decisions.
#[derive(Debug, Clone)]
pub struct EventMetadata {
    /// Unique identifier for this event instance
    pub event_id: Uuid,

    /// Timestamp when the event was created
    pub timestamp: DateTime<Utc>,

    /// Source that generated this event
    pub source: Option<String>,
}

impl EventMetadata {
    /// Create new metadata with generated event ID and current timestamp
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: None,
        }
    }

    /// Set the event source
    pub fn set_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}
