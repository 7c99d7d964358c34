use std::time::Duration;

/// Errors surfaced to callers of the pool.
///
/// Task failures never appear here: they are logged and published as events,
/// but the producer that enqueued the job is not told about them.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The queue already holds `max_jobs` pending jobs.
    #[error("job queue is full")]
    QueueFull,

    /// The queue was closed by `shutdown`; no further jobs are accepted.
    #[error("job queue is closed")]
    Closed,

    /// A job must contain at least one task.
    #[error("job contains no tasks")]
    EmptyJob,

    /// The drain did not finish before the deadline.
    #[error("shutdown timed out after {timeout:?} with {in_flight} job(s) still in flight")]
    ShutdownTimeout { timeout: Duration, in_flight: usize },

    /// `run` was called on a pool that is already running.
    #[error("worker pool is already running")]
    AlreadyStarted,

    /// The pool reached its terminal state and cannot be restarted.
    #[error("worker pool is stopped")]
    Stopped,

    /// `run` was called outside of a Tokio runtime.
    #[error("no tokio runtime available to spawn the dispatcher")]
    NoRuntime,
}

impl PoolError {
    /// Whether the caller can reasonably retry the same operation later.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, PoolError::QueueFull)
    }
}
