//! Error types for the tokio-courier library.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tokio-courier
#[derive(Error, Debug)]
pub enum Error {
    /// A subscriber declared a malformed handler
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required argument was missing or empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The coordinator has been shut down
    #[error("Coordinator is shutting down")]
    ShuttingDown,

    /// Task submission needs a tokio runtime and none was available
    #[error("No tokio runtime available for task execution")]
    NoRuntime,

    /// Payload (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a new internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Check if this error indicates the coordinator is shutting down
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::ShuttingDown)
    }

    /// Check if this error comes from a malformed subscriber declaration
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

/// Failure reported by an application handler.
///
/// Handler failures never reach the caller of `post` or `subscribe`;
/// the coordinator logs them and keeps going.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler rejected the event with a message
    #[error("{0}")]
    Failed(String),

    /// The handler panicked while running
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The subscriber instance was dropped before a scheduled dispatch ran
    #[error("subscriber dropped before dispatch")]
    SubscriberGone,
}

impl HandlerError {
    /// Create a failure with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        HandlerError::Failed(msg.into())
    }

    pub(crate) fn from_panic(panic: &(dyn std::any::Any + Send)) -> Self {
        HandlerError::Panicked(panic_message(panic))
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Context attached to a logged delivery failure
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    /// Id of the delivered event
    pub event_id: Uuid,
    /// When the event was created
    pub posted_at: DateTime<Utc>,
    /// Variant name of the event
    pub event_type: &'static str,
    /// Subscriber type name
    pub subscriber: &'static str,
    /// Handler name
    pub handler: &'static str,
}

impl fmt::Display for DeliveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[event_id: {}] [type: {}] [subscriber: {}] [handler: {}] [posted_at: {}]",
            self.event_id,
            self.event_type,
            self.subscriber,
            self.handler,
            self.posted_at.to_rfc3339()
        )
    }
}
