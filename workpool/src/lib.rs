//! Workpool - bounded in-process worker pool for Tokio applications.
//!
//! Producers submit jobs, each an ordered list of tasks, into a bounded
//! FIFO queue. A background dispatch loop pulls jobs off the queue and runs
//! each one on its own Tokio task, while a slot limiter caps how many jobs
//! execute at once.
//!
//! # Core Concepts
//!
//! - **Task**: The atomic unit of work. Tasks implement the [`Task`] trait
//!   (or wrap a closure with [`task_fn`]) and may fail without affecting
//!   their siblings.
//!
//! - **Job**: An ordered, non-empty list of tasks executed sequentially by
//!   one execution unit. See [`Job`].
//!
//! - **Queue**: The [`JobQueue`] buffers at most `max_jobs` pending jobs and
//!   applies backpressure to producers.
//!
//! - **Slots**: [`ConcurrencySlots`] bound how many jobs execute at once.
//!
//! - **Events**: The event system (via [`PoolEventPublisher`] and
//!   [`InProcEventBus`]) reports job and pool lifecycle transitions.
//!
//! - **Runtime**: The [`WorkerPool`] ties the pieces together and owns the
//!   run / shutdown lifecycle.
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use workpool::*;
//!
//! let pool = WorkerPool::new(PoolConfig::new("mailer").with_concurrency(2));
//! let token = ShutdownToken::new();
//! pool.run(token.clone()).await?;
//!
//! pool.add_job(vec![
//!     task_fn("render", |_ctx| async { Ok(()) }),
//!     task_fn("send", |_ctx| async { Ok(()) }),
//! ])
//! .await?;
//!
//! pool.shutdown(Duration::from_secs(10)).await?;
//! ```

/// Pool configuration and defaults.
///
/// The `config` module defines [`PoolConfig`] with its builder-style setters
/// and the `DEFAULT_*` constants.
pub mod config;

/// Errors returned by pool operations.
pub mod error;

/// Event publishing and subscription system.
///
/// The `events` module provides:
/// - [`PoolEventPublisher`] for pluggable sinks
/// - [`PoolEvent`] and [`PoolEventPayload`] for event data
/// - [`InProcEventBus`] for in-process event broadcasting
pub mod events;

/// Jobs and their identifiers.
pub mod job;

#[cfg(feature = "metrics")]
/// Prometheus metrics.
///
/// The `metrics` module registers pool counters, gauges and histograms when
/// the `metrics` feature is enabled.
pub mod metrics;

/// Bounded FIFO of pending jobs.
pub mod queue;

/// Runtime orchestration.
///
/// The `runtime` module provides the [`WorkerPool`] and its lifecycle:
/// - [`WorkerPool`] - main pool type
/// - [`WorkerPoolBuilder`] - builder for pools with an event publisher
/// - [`ShutdownToken`] - cancellation signaling
/// - [`PoolStatus`] - externally visible status
pub mod runtime;

/// Concurrency slot limiter.
pub mod slots;

/// The [`Task`] trait, [`TaskContext`] and closure-backed tasks.
pub mod task;

/// Tracing spans and metric recording helpers.
pub mod telemetry;

pub use config::*;
pub use error::*;
pub use events::*;
pub use job::*;
pub use queue::*;
pub use runtime::*;
pub use slots::*;
pub use task::*;
