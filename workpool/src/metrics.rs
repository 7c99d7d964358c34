//! Prometheus metrics instrumentation for workpool.
//!
//! All metrics are conditionally compiled behind the `metrics` feature flag.
//!
//! # Metrics
//!
//! ## Counters
//! - `workpool_jobs_enqueued_total` - Jobs accepted into the queue
//! - `workpool_jobs_rejected_total` - Jobs refused with a full queue
//! - `workpool_tasks_completed_total` - Tasks run, labelled by status
//!
//! ## Gauges
//! - `workpool_queue_depth` - Jobs waiting to be dispatched
//! - `workpool_active_jobs` - Jobs currently holding a slot
//!
//! ## Histograms
//! - `workpool_job_duration_seconds` - Job execution duration in seconds
#![cfg(feature = "metrics")]

use prometheus::{exponential_buckets, CounterVec, GaugeVec, HistogramVec, Opts, Registry};
use std::sync::LazyLock;

/// Global Prometheus registry for workpool metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Counter for jobs accepted into the queue.
///
/// Labels:
/// - `pool`: The pool name
pub static JOBS_ENQUEUED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("workpool_jobs_enqueued_total", "Total number of jobs enqueued");
    CounterVec::new(opts, &["pool"]).expect("workpool_jobs_enqueued_total metric creation failed")
});

/// Counter for jobs refused because the queue was full.
pub static JOBS_REJECTED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "workpool_jobs_rejected_total",
        "Total number of jobs rejected with a full queue",
    );
    CounterVec::new(opts, &["pool"]).expect("workpool_jobs_rejected_total metric creation failed")
});

/// Counter for executed tasks.
///
/// Labels:
/// - `pool`: The pool name
/// - `status`: success or failure
pub static TASKS_COMPLETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "workpool_tasks_completed_total",
        "Total number of tasks executed",
    );
    CounterVec::new(opts, &["pool", "status"])
        .expect("workpool_tasks_completed_total metric creation failed")
});

pub static QUEUE_DEPTH: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new("workpool_queue_depth", "Jobs waiting to be dispatched");
    GaugeVec::new(opts, &["pool"]).expect("workpool_queue_depth metric creation failed")
});

pub static ACTIVE_JOBS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new("workpool_active_jobs", "Jobs currently holding a slot");
    GaugeVec::new(opts, &["pool"]).expect("workpool_active_jobs metric creation failed")
});

/// Histogram for job execution duration in seconds.
pub static JOB_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.001, 2.0, 15).expect("bucket creation failed");
    let opts = prometheus::HistogramOpts::new(
        "workpool_job_duration_seconds",
        "Job execution duration in seconds",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["pool", "status"])
        .expect("workpool_job_duration_seconds metric creation failed")
});

/// Register all metrics with the global registry.
///
/// Idempotent; duplicate registrations are ignored.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(JOBS_ENQUEUED_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(JOBS_REJECTED_TOTAL.clone()),
        Box::new(TASKS_COMPLETED_TOTAL.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(ACTIVE_JOBS.clone()),
        Box::new(JOB_DURATION_SECONDS.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

pub fn record_job_enqueued(pool: &str) {
    JOBS_ENQUEUED_TOTAL.with_label_values(&[pool]).inc();
}

pub fn record_job_rejected(pool: &str) {
    JOBS_REJECTED_TOTAL.with_label_values(&[pool]).inc();
}

pub fn record_task_completed(pool: &str, status: &str) {
    TASKS_COMPLETED_TOTAL
        .with_label_values(&[pool, status])
        .inc();
}

pub fn set_queue_depth(pool: &str, depth: f64) {
    QUEUE_DEPTH.with_label_values(&[pool]).set(depth);
}

pub fn set_active_jobs(pool: &str, active: f64) {
    ACTIVE_JOBS.with_label_values(&[pool]).set(active);
}

pub fn observe_job_duration(pool: &str, status: &str, duration_secs: f64) {
    JOB_DURATION_SECONDS
        .with_label_values(&[pool, status])
        .observe(duration_secs);
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}
