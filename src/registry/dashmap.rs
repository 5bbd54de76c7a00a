//! DashMap-based implementation of HandlerRegistry for concurrent access.

use super::{HandlerRegistry, ResolvedHandlers};
use crate::Result;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A thread-safe handler cache using DashMap.
///
/// Lookups vastly outnumber insertions: every delivery reads, while each
/// subscriber type is written once per process.
#[derive(Debug, Clone)]
pub struct DashMapRegistry {
    /// Map from subscriber TypeId to its resolved handlers
    handlers: Arc<DashMap<TypeId, Arc<ResolvedHandlers>>>,
}

impl DashMapRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(DashMap::new()),
        }
    }

    /// Create a registry with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            handlers: Arc::new(DashMap::with_capacity(capacity)),
        }
    }
}

impl Default for DashMapRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry for DashMapRegistry {
    fn resolve_with(
        &self,
        subscriber_type: TypeId,
        build: &mut dyn FnMut() -> Result<ResolvedHandlers>,
    ) -> Result<Arc<ResolvedHandlers>> {
        if let Some(found) = self.handlers.get(&subscriber_type) {
            trace!(subscriber = found.subscriber(), "Handler cache hit");
            return Ok(Arc::clone(found.value()));
        }

        // Build outside the shard lock; a racing builder loses to whoever inserts first.
        let resolved = match build() {
            Ok(resolved) => Arc::new(resolved),
            Err(e) => {
                warn!(error = %e, "Subscriber handler resolution failed");
                return Err(e);
            }
        };

        debug!(
            subscriber = resolved.subscriber(),
            handlers = resolved.len(),
            "Subscriber handlers resolved"
        );

        let entry = self.handlers.entry(subscriber_type).or_insert(resolved);
        Ok(Arc::clone(entry.value()))
    }

    fn contains(&self, subscriber_type: TypeId) -> bool {
        self.handlers.contains_key(&subscriber_type)
    }

    fn len(&self) -> usize {
        self.handlers.len()
    }
}
