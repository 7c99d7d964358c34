use std::fmt;
use std::sync::Arc;

use crate::config::PoolConfig;
use crate::events::PoolEventPublisher;

use super::supervisor::WorkerPool;

/// Builder for constructing a [`WorkerPool`] with optional collaborators.
///
/// # Example
///
/// ```ignore
/// use workpool::*;
///
/// let bus = Arc::new(InProcEventBus::default());
/// let pool = WorkerPoolBuilder::new()
///     .with_name("mailer")
///     .with_max_jobs(500)
///     .with_concurrency(8)
///     .with_events(bus.clone())
///     .build();
/// ```
#[derive(Default)]
pub struct WorkerPoolBuilder {
    config: PoolConfig,
    events: Option<Arc<dyn PoolEventPublisher>>,
}

impl fmt::Debug for WorkerPoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPoolBuilder")
            .field("config", &self.config)
            .field("events_set", &self.events.is_some())
            .finish()
    }
}

impl WorkerPoolBuilder {
    /// Create a builder starting from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_name(name);
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.config = self.config.with_max_jobs(max_jobs);
        self
    }

    pub fn with_min_jobs(mut self, min_jobs: usize) -> Self {
        self.config = self.config.with_min_jobs(min_jobs);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config = self.config.with_concurrency(concurrency);
        self
    }

    /// Set the event publisher.
    pub fn with_events(mut self, events: Arc<dyn PoolEventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the pool. Zero or empty settings fall back to their defaults.
    pub fn build(self) -> WorkerPool {
        WorkerPool::from_parts(self.config, self.events)
    }
}
