//! Tracing and telemetry instrumentation for workpool.
//!
//! Helpers for creating tracing spans and recording metrics during job
//! execution. Every function works with and without the `metrics` feature;
//! without it the metric side is compiled out and only the log line remains.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info_span, Instrument, Span};

/// Create a tracing span covering the execution of one job.
#[must_use]
pub fn job_execute_span(pool: impl AsRef<str>, job_id: impl AsRef<str>, tasks: usize) -> Span {
    info_span!(
        "workpool.job",
        pool = %pool.as_ref(),
        job_id = %job_id.as_ref(),
        tasks = tasks,
    )
}

/// Create a tracing span for a single task inside a job.
#[must_use]
pub fn task_span(task: impl AsRef<str>, index: usize) -> Span {
    info_span!("workpool.task", task = %task.as_ref(), index = index)
}

/// Attach a job execution span to a future.
pub fn instrument_job<F>(
    pool: impl AsRef<str>,
    job_id: impl AsRef<str>,
    tasks: usize,
    future: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    future.instrument(job_execute_span(pool, job_id, tasks))
}

/// Record a job accepted into the queue.
pub fn record_job_enqueued(pool: impl AsRef<str>, job_id: impl AsRef<str>, tasks: usize) {
    tracing::debug!(
        pool = %pool.as_ref(),
        job_id = %job_id.as_ref(),
        tasks = tasks,
        "job enqueued"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_job_enqueued(pool.as_ref());
}

/// Record a job refused because the queue was full.
pub fn record_job_rejected(pool: impl AsRef<str>, tasks: usize) {
    tracing::warn!(pool = %pool.as_ref(), tasks = tasks, "job queue is full");

    #[cfg(feature = "metrics")]
    crate::metrics::record_job_rejected(pool.as_ref());
}

/// Record the outcome of one task.
pub fn record_task_completed(pool: impl AsRef<str>, status: impl AsRef<str>) {
    #[cfg(feature = "metrics")]
    crate::metrics::record_task_completed(pool.as_ref(), status.as_ref());

    #[cfg(not(feature = "metrics"))]
    let _ = (pool, status);
}

/// Update the queue depth gauge.
pub fn set_queue_depth(pool: impl AsRef<str>, depth: usize) {
    tracing::trace!(pool = %pool.as_ref(), depth = depth, "queue depth updated");

    #[cfg(feature = "metrics")]
    crate::metrics::set_queue_depth(pool.as_ref(), depth as f64);
}

/// Update the active jobs gauge.
pub fn set_active_jobs(pool: impl AsRef<str>, active: usize) {
    tracing::trace!(pool = %pool.as_ref(), active = active, "active jobs updated");

    #[cfg(feature = "metrics")]
    crate::metrics::set_active_jobs(pool.as_ref(), active as f64);
}

/// Start timing a job. Pass the handle to [`record_job_end`].
pub fn record_job_start() -> JobTimingHandle {
    JobTimingHandle {
        started: Instant::now(),
    }
}

/// Finish timing a job and observe its duration.
pub fn record_job_end(
    handle: JobTimingHandle,
    pool: impl AsRef<str>,
    status: impl AsRef<str>,
) -> Duration {
    let elapsed = handle.started.elapsed();
    tracing::info!(
        pool = %pool.as_ref(),
        status = %status.as_ref(),
        elapsed_ms = elapsed.as_millis() as u64,
        "job completed"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::observe_job_duration(pool.as_ref(), status.as_ref(), elapsed.as_secs_f64());

    elapsed
}

/// Opaque start marker returned by [`record_job_start`].
#[derive(Debug)]
pub struct JobTimingHandle {
    started: Instant,
}
