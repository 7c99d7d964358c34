use serde::{Deserialize, Serialize};

/// Default diagnostic name for a pool.
pub const DEFAULT_POOL_NAME: &str = "default-worker";
/// Default queue capacity.
pub const DEFAULT_MAX_JOBS: usize = 100;
/// Default value of the reserved `min_jobs` option.
pub const DEFAULT_MIN_JOBS: usize = 1;
/// Default number of jobs allowed to execute at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Configuration for a [`WorkerPool`](crate::runtime::WorkerPool).
///
/// Every call to [`PoolConfig::default`] builds a fresh value; there is no
/// shared template. Setters coerce zero to the default so a pool can never
/// be built with an empty queue or no slots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Diagnostic label attached to every log line and event.
    pub name: String,
    /// Capacity of the pending-job queue.
    pub max_jobs: usize,
    /// Accepted for compatibility and logged at startup; no behavior reads it.
    pub min_jobs: usize,
    /// Capacity of the concurrency slot limiter.
    pub concurrency: usize,
}

impl PoolConfig {
    /// Create a configuration with the given name and default limits.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the pool name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the queue capacity. Zero falls back to [`DEFAULT_MAX_JOBS`].
    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = or_default(max_jobs, DEFAULT_MAX_JOBS);
        self
    }

    /// Set the reserved minimum. Zero falls back to [`DEFAULT_MIN_JOBS`].
    pub fn with_min_jobs(mut self, min_jobs: usize) -> Self {
        self.min_jobs = or_default(min_jobs, DEFAULT_MIN_JOBS);
        self
    }

    /// Set the concurrency ceiling. Zero falls back to [`DEFAULT_CONCURRENCY`].
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = or_default(concurrency, DEFAULT_CONCURRENCY);
        self
    }

    /// Apply the zero coercions to a configuration that did not go through
    /// the setters, e.g. one deserialized from a file.
    pub fn normalized(self) -> Self {
        let name = if self.name.trim().is_empty() {
            DEFAULT_POOL_NAME.to_string()
        } else {
            self.name
        };
        Self {
            name,
            max_jobs: or_default(self.max_jobs, DEFAULT_MAX_JOBS),
            min_jobs: or_default(self.min_jobs, DEFAULT_MIN_JOBS),
            concurrency: or_default(self.concurrency, DEFAULT_CONCURRENCY),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_POOL_NAME.to_string(),
            max_jobs: DEFAULT_MAX_JOBS,
            min_jobs: DEFAULT_MIN_JOBS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

fn or_default(value: usize, default: usize) -> usize {
    if value == 0 {
        default
    } else {
        value
    }
}
