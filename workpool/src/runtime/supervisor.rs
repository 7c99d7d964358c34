use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::events::{PoolEvent, PoolEventPayload, PoolEventPublisher, StopReason};
use crate::job::{Job, JobId};
use crate::queue::JobQueue;
use crate::slots::ConcurrencySlots;
use crate::task::SharedTask;
use crate::telemetry;

use super::builder::WorkerPoolBuilder;
use super::worker;

/// Cancellation signal handed to [`WorkerPool::run`] and to every task.
#[derive(Clone, Debug)]
pub struct ShutdownToken {
    inner: Arc<ShutdownTokenInner>,
}

#[derive(Debug)]
struct ShutdownTokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl ShutdownToken {
    /// Create a new shutdown token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownTokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Externally visible pool status.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PoolStatus {
    /// Built but `run` has not been called.
    NotStarted,
    /// Dispatching, with no job currently holding a slot.
    Running,
    /// Dispatching, with at least one job executing.
    Processing,
    /// Terminal.
    Stopped,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::NotStarted => "not_started",
            PoolStatus::Running => "running",
            PoolStatus::Processing => "processing",
            PoolStatus::Stopped => "stopped",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PoolStatus::Running)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, PoolStatus::Processing)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, PoolStatus::Stopped)
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle flags and job counters shared by callers, the dispatcher and
/// every execution unit.
#[derive(Debug)]
pub(crate) struct PoolState {
    lifecycle: AtomicU8,
    running: AtomicBool,
    /// Jobs holding a slot.
    active: AtomicUsize,
    /// Jobs handed to an execution unit that has not finished yet.
    in_flight: AtomicUsize,
    idle: Notify,
}

impl PoolState {
    fn new() -> Self {
        Self {
            lifecycle: AtomicU8::new(NOT_STARTED),
            running: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    fn start(&self) -> Result<(), PoolError> {
        match self.lifecycle.compare_exchange(
            NOT_STARTED,
            RUNNING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                self.running.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(RUNNING) => Err(PoolError::AlreadyStarted),
            Err(_) => Err(PoolError::Stopped),
        }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.lifecycle.store(STOPPED, Ordering::SeqCst);
    }

    fn status(&self) -> PoolStatus {
        match self.lifecycle.load(Ordering::SeqCst) {
            NOT_STARTED => PoolStatus::NotStarted,
            RUNNING if self.active.load(Ordering::SeqCst) > 0 => PoolStatus::Processing,
            RUNNING => PoolStatus::Running,
            _ => PoolStatus::Stopped,
        }
    }

    pub(crate) fn enter_active(&self) -> usize {
        self.active.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn leave_active(&self) -> usize {
        self.active.fetch_sub(1, Ordering::SeqCst) - 1
    }

    fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Everything the dispatcher and execution units need, behind one `Arc`.
pub(crate) struct PoolShared {
    pub(crate) name: Arc<str>,
    pub(crate) queue: JobQueue,
    pub(crate) slots: ConcurrencySlots,
    pub(crate) state: PoolState,
    events: Option<Arc<dyn PoolEventPublisher>>,
}

impl PoolShared {
    pub(crate) fn publish(&self, payload: PoolEventPayload) {
        if let Some(events) = &self.events {
            if let Err(err) = events.publish(PoolEvent::new(&*self.name, payload)) {
                tracing::error!(pool = %self.name, "publish pool event failed: {err}");
            }
        }
    }
}

/// Marks a job as in flight from dispatch until its execution unit ends,
/// whether it ran, was abandoned, or unwound.
pub(crate) struct InFlightGuard {
    shared: Arc<PoolShared>,
}

impl InFlightGuard {
    fn register(shared: Arc<PoolShared>) -> Self {
        shared.state.in_flight.fetch_add(1, Ordering::SeqCst);
        Self { shared }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.shared.state.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.state.idle.notify_waiters();
        }
    }
}

/// Bounded in-process worker pool.
///
/// Jobs are queued in FIFO order (at most `max_jobs` pending), pulled off by
/// a background dispatch loop, and executed on independent Tokio tasks of
/// which at most `concurrency` run task code at any instant.
///
/// # Example
///
/// ```ignore
/// let pool = WorkerPool::new(PoolConfig::new("mailer").with_concurrency(3));
/// let token = ShutdownToken::new();
/// pool.run(token.clone()).await?;
///
/// pool.add_job(vec![task_fn("send", |_ctx| async { Ok(()) })]).await?;
///
/// pool.shutdown(Duration::from_secs(10)).await?;
/// ```
pub struct WorkerPool {
    config: PoolConfig,
    shared: Arc<PoolShared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("status", &self.status())
            .field("queue_length", &self.queue_length())
            .field("active_jobs", &self.active_jobs())
            .field("in_flight_jobs", &self.in_flight_jobs())
            .field("events_set", &self.shared.events.is_some())
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool without an event publisher.
    pub fn new(config: PoolConfig) -> Self {
        Self::from_parts(config, None)
    }

    /// Start building a pool.
    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder::new()
    }

    pub(crate) fn from_parts(
        config: PoolConfig,
        events: Option<Arc<dyn PoolEventPublisher>>,
    ) -> Self {
        let config = config.normalized();
        let shared = Arc::new(PoolShared {
            name: Arc::from(config.name.as_str()),
            queue: JobQueue::new(config.max_jobs),
            slots: ConcurrencySlots::new(config.concurrency),
            state: PoolState::new(),
            events,
        });
        Self {
            config,
            shared,
            dispatcher: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Start the dispatch loop and return immediately.
    ///
    /// Cancelling `token` stops the loop from pulling further jobs and moves
    /// the pool to [`PoolStatus::Stopped`]. Jobs already executing are not
    /// interrupted; their tasks see the cancellation through
    /// [`TaskContext`](crate::task::TaskContext) and may stop early. Jobs
    /// still waiting for a slot are abandoned.
    ///
    /// # Errors
    ///
    /// [`PoolError::NoRuntime`] outside a Tokio runtime,
    /// [`PoolError::AlreadyStarted`] on a second call and
    /// [`PoolError::Stopped`] once the pool has stopped or `shutdown` has
    /// closed the queue.
    pub async fn run(&self, token: ShutdownToken) -> Result<(), PoolError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        // Held until the handle is stored so a concurrent `shutdown` either
        // sees the live dispatcher or finds the queue closed first.
        let mut dispatcher = self.dispatcher.lock().await;
        if self.shared.queue.is_closed() {
            return Err(PoolError::Stopped);
        }
        self.shared.state.start()?;

        tracing::info!(
            pool = %self.shared.name,
            min_jobs = self.config.min_jobs,
            max_jobs = self.config.max_jobs,
            concurrency = self.config.concurrency,
            "worker pool started"
        );
        self.shared.publish(PoolEventPayload::Started {
            max_jobs: self.config.max_jobs,
            min_jobs: self.config.min_jobs,
            concurrency: self.config.concurrency,
        });

        let handle = runtime.spawn(Self::dispatch_loop(Arc::clone(&self.shared), token));
        *dispatcher = Some(handle);
        Ok(())
    }

    /// Enqueue one job made of `tasks`, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// [`PoolError::EmptyJob`] for an empty task list and
    /// [`PoolError::Closed`] once `shutdown` has closed the queue, including
    /// when the close happens while this call is waiting.
    pub async fn add_job<I>(&self, tasks: I) -> Result<JobId, PoolError>
    where
        I: IntoIterator<Item = SharedTask>,
    {
        let job = Job::new(tasks)?;
        let job_id = job.id();
        self.shared
            .queue
            .push_with(job, |job, depth| self.on_enqueued(job, depth))
            .await?;
        Ok(job_id)
    }

    /// Enqueue one job made of `tasks` without waiting.
    ///
    /// # Errors
    ///
    /// [`PoolError::QueueFull`] when `max_jobs` jobs are already pending,
    /// plus the errors of [`WorkerPool::add_job`].
    pub fn try_add_job<I>(&self, tasks: I) -> Result<JobId, PoolError>
    where
        I: IntoIterator<Item = SharedTask>,
    {
        let job = Job::new(tasks)?;
        let (job_id, task_count) = (job.id(), job.len());
        match self
            .shared
            .queue
            .try_push_with(job, |job, depth| self.on_enqueued(job, depth))
        {
            Ok(()) => Ok(job_id),
            Err(PoolError::QueueFull) => {
                telemetry::record_job_rejected(&*self.shared.name, task_count);
                self.shared
                    .publish(PoolEventPayload::JobRejected { tasks: task_count });
                Err(PoolError::QueueFull)
            }
            Err(err) => Err(err),
        }
    }

    /// Runs under the queue lock, so `JobEnqueued` always precedes the
    /// job's `JobDispatched`.
    fn on_enqueued(&self, job: &Job, depth: usize) {
        telemetry::record_job_enqueued(&*self.shared.name, job.id().to_string(), job.len());
        telemetry::set_queue_depth(&*self.shared.name, depth);
        self.shared.publish(PoolEventPayload::JobEnqueued {
            job_id: job.id(),
            tasks: job.len(),
        });
    }

    /// Close the queue and wait, at most `timeout`, for every accepted job
    /// to finish.
    ///
    /// Jobs still queued when the queue closes are dispatched and awaited.
    /// If `run` was never called, or its token was cancelled, queued jobs
    /// can no longer run and are discarded.
    ///
    /// # Errors
    ///
    /// [`PoolError::ShutdownTimeout`] when the deadline passes first. Work
    /// may still be running; the caller decides how to react.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), PoolError> {
        self.shared.state.running.store(false, Ordering::SeqCst);
        self.shared.queue.close();
        tracing::info!(
            pool = %self.shared.name,
            timeout_ms = timeout.as_millis() as u64,
            "worker pool shutdown requested"
        );

        match tokio::time::timeout(timeout, self.drain()).await {
            Ok(()) => {
                self.shared.state.stop();
                tracing::info!(pool = %self.shared.name, "worker pool shutdown completed");
                self.shared.publish(PoolEventPayload::ShutdownCompleted);
                Ok(())
            }
            Err(_) => {
                let in_flight = self.shared.state.in_flight();
                tracing::warn!(
                    pool = %self.shared.name,
                    in_flight = in_flight,
                    "worker pool shutdown timed out"
                );
                self.shared
                    .publish(PoolEventPayload::ShutdownTimedOut { in_flight });
                Err(PoolError::ShutdownTimeout { timeout, in_flight })
            }
        }
    }

    async fn drain(&self) {
        {
            let mut dispatcher = self.dispatcher.lock().await;
            if let Some(handle) = dispatcher.as_mut() {
                let result = handle.await;
                *dispatcher = None;
                if let Err(err) = result {
                    tracing::warn!(pool = %self.shared.name, "dispatcher task failed: {err}");
                }
            }
        }

        let discarded = self.shared.queue.discard();
        if discarded > 0 {
            tracing::warn!(
                pool = %self.shared.name,
                discarded = discarded,
                "discarding jobs that were never dispatched"
            );
            telemetry::set_queue_depth(&*self.shared.name, 0);
        }

        self.shared.state.wait_idle().await;
    }

    /// Current status.
    pub fn status(&self) -> PoolStatus {
        self.shared.state.status()
    }

    /// Jobs enqueued but not yet pulled off by the dispatch loop.
    pub fn queue_length(&self) -> usize {
        self.shared.queue.len()
    }

    /// Whether the pool is accepting and dispatching work.
    pub fn is_running(&self) -> bool {
        self.shared.state.running.load(Ordering::SeqCst)
    }

    /// Jobs currently holding a slot.
    pub fn active_jobs(&self) -> usize {
        self.shared.state.active()
    }

    /// Jobs dispatched and not yet finished, including those waiting for a slot.
    pub fn in_flight_jobs(&self) -> usize {
        self.shared.state.in_flight()
    }

    /// Slots not currently held by a job.
    pub fn available_slots(&self) -> usize {
        self.shared.slots.available()
    }

    async fn dispatch_loop(shared: Arc<PoolShared>, token: ShutdownToken) {
        let reason = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break StopReason::Cancelled,
                next = shared.queue.pop() => {
                    let Some(job) = next else {
                        break StopReason::QueueClosed;
                    };
                    let job_id = job.id();
                    telemetry::set_queue_depth(&*shared.name, shared.queue.len());
                    shared.publish(PoolEventPayload::JobDispatched { job_id });

                    let in_flight = InFlightGuard::register(Arc::clone(&shared));
                    tokio::spawn(worker::execute_job(
                        Arc::clone(&shared),
                        job,
                        token.clone(),
                        in_flight,
                    ));
                }
            }
        };

        shared.state.stop();
        match reason {
            StopReason::Cancelled => {
                tracing::info!(pool = %shared.name, "worker pool stopped");
            }
            StopReason::QueueClosed => {
                tracing::info!(pool = %shared.name, "job queue closed");
            }
        }
        shared.publish(PoolEventPayload::Stopped { reason });
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Nobody can enqueue once the pool is gone; let the dispatcher drain and exit.
        self.shared.queue.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InProcEventBus;
    use crate::task::task_fn;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::broadcast;
    use tokio::time::timeout;

    fn noop() -> SharedTask {
        task_fn("noop", |_ctx| async { Ok(()) })
    }

    fn sleeper(ms: u64) -> SharedTask {
        task_fn("sleep", move |_ctx| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(())
        })
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met within 5 seconds");
    }

    fn drain_events(rx: &mut broadcast::Receiver<PoolEvent>) -> Vec<PoolEventPayload> {
        let mut payloads = Vec::new();
        while let Ok(event) = rx.try_recv() {
            payloads.push(event.payload);
        }
        payloads
    }

    #[tokio::test]
    async fn test_shutdown_token_shared_state() {
        let token = ShutdownToken::new();
        let clone1 = token.clone();
        let clone2 = token.clone();

        token.cancel();

        assert!(clone1.is_cancelled());
        assert!(clone2.is_cancelled());
        timeout(Duration::from_secs(1), clone1.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_token_cancelled_wakes_clones() {
        let token = ShutdownToken::new();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let clone = token.clone();
                tokio::spawn(async move { clone.cancelled().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let results = timeout(Duration::from_secs(5), futures::future::join_all(handles))
            .await
            .expect("waiters did not observe cancellation within 5 seconds");
        for r in results {
            r.expect("waiter panicked");
        }
    }

    #[tokio::test]
    async fn test_shutdown_token_default_not_cancelled() {
        assert!(!ShutdownToken::default().is_cancelled());
    }

    #[tokio::test]
    async fn test_new_pool_is_not_started() {
        let pool = WorkerPool::new(PoolConfig::default());
        assert_eq!(pool.status(), PoolStatus::NotStarted);
        assert!(!pool.is_running());
        assert_eq!(pool.queue_length(), 0);
        assert_eq!(pool.available_slots(), 5);
        assert_eq!(pool.name(), "default-worker");
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let pool = WorkerPool::new(PoolConfig::default());
        pool.run(ShutdownToken::new()).await.unwrap();
        assert!(matches!(
            pool.run(ShutdownToken::new()).await,
            Err(PoolError::AlreadyStarted)
        ));
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_is_terminal() {
        let pool = WorkerPool::new(PoolConfig::default());
        pool.run(ShutdownToken::new()).await.unwrap();
        pool.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert!(matches!(
            pool.run(ShutdownToken::new()).await,
            Err(PoolError::Stopped)
        ));
    }

    #[test]
    fn test_run_outside_runtime() {
        let pool = WorkerPool::new(PoolConfig::default());
        let result = futures::executor::block_on(pool.run(ShutdownToken::new()));
        assert!(matches!(result, Err(PoolError::NoRuntime)));
        assert_eq!(pool.status(), PoolStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_empty_job_rejected() {
        let pool = WorkerPool::new(PoolConfig::default());
        assert!(matches!(
            pool.try_add_job(Vec::new()),
            Err(PoolError::EmptyJob)
        ));
        assert!(matches!(
            pool.add_job(Vec::new()).await,
            Err(PoolError::EmptyJob)
        ));
    }

    #[tokio::test]
    async fn test_queue_length_counts_undispatched_jobs() {
        let pool = WorkerPool::new(PoolConfig::default().with_max_jobs(3));
        pool.try_add_job(vec![noop()]).unwrap();
        pool.add_job(vec![noop()]).await.unwrap();
        assert_eq!(pool.queue_length(), 2);

        pool.run(ShutdownToken::new()).await.unwrap();
        wait_for(|| pool.queue_length() == 0).await;
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_reports_processing() {
        let pool = WorkerPool::new(PoolConfig::default().with_concurrency(1));
        pool.run(ShutdownToken::new()).await.unwrap();
        assert_eq!(pool.status(), PoolStatus::Running);

        pool.add_job(vec![sleeper(200)]).await.unwrap();
        wait_for(|| pool.status() == PoolStatus::Processing).await;
        assert_eq!(pool.active_jobs(), 1);
        assert_eq!(pool.available_slots(), 0);

        wait_for(|| pool.status() == PoolStatus::Running).await;
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_token_stops_pool() {
        let pool = WorkerPool::new(PoolConfig::default());
        let token = ShutdownToken::new();
        pool.run(token.clone()).await.unwrap();
        assert!(pool.is_running());

        token.cancel();
        wait_for(|| pool.status() == PoolStatus::Stopped).await;
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_before_run_discards_queue() {
        let pool = WorkerPool::new(PoolConfig::default());
        pool.try_add_job(vec![noop()]).unwrap();

        pool.shutdown(Duration::from_millis(100)).await.unwrap();
        assert_eq!(pool.queue_length(), 0);
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert!(matches!(
            pool.try_add_job(vec![noop()]),
            Err(PoolError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_jobs() {
        let pool = WorkerPool::new(PoolConfig::default().with_concurrency(2));
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let done = Arc::clone(&done);
            pool.try_add_job(vec![task_fn("count", move |_ctx| {
                let done = Arc::clone(&done);
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })])
            .unwrap();
        }

        pool.run(ShutdownToken::new()).await.unwrap();
        pool.shutdown(Duration::from_secs(2)).await.unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert_eq!(pool.in_flight_jobs(), 0);
        assert_eq!(pool.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_times_out() {
        let pool = WorkerPool::new(PoolConfig::default());
        pool.run(ShutdownToken::new()).await.unwrap();
        pool.add_job(vec![sleeper(500)]).await.unwrap();
        wait_for(|| pool.active_jobs() == 1).await;

        let err = pool.shutdown(Duration::from_millis(50)).await.unwrap_err();
        match err {
            PoolError::ShutdownTimeout { in_flight, .. } => assert_eq!(in_flight, 1),
            other => panic!("expected timeout, got {other:?}"),
        }

        // A later call with enough time completes the drain.
        pool.shutdown(Duration::from_secs(2)).await.unwrap();
        assert_eq!(pool.status(), PoolStatus::Stopped);
    }

    #[tokio::test]
    async fn test_lifecycle_events_published() {
        let bus = Arc::new(InProcEventBus::new(64));
        let mut rx = bus.subscribe_events();
        let pool = WorkerPool::builder()
            .with_config(PoolConfig::new("evented"))
            .with_events(bus.clone())
            .build();

        pool.run(ShutdownToken::new()).await.unwrap();
        pool.add_job(vec![noop()]).await.unwrap();
        pool.shutdown(Duration::from_secs(1)).await.unwrap();

        let payloads = drain_events(&mut rx);
        assert!(matches!(payloads.first(), Some(PoolEventPayload::Started { .. })));
        assert!(payloads
            .iter()
            .any(|p| matches!(p, PoolEventPayload::JobCompleted { failed_tasks: 0, .. })));
        assert!(payloads.iter().any(|p| matches!(
            p,
            PoolEventPayload::Stopped {
                reason: StopReason::QueueClosed
            }
        )));
        assert!(matches!(
            payloads.last(),
            Some(PoolEventPayload::ShutdownCompleted)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_run_and_shutdown_keep_accepted_jobs() {
        for _ in 0..50 {
            let pool = Arc::new(WorkerPool::new(PoolConfig::default()));
            let ran = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&ran);
            pool.try_add_job(vec![task_fn("count", move |_ctx| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })])
            .unwrap();

            let runner = {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.run(ShutdownToken::new()).await })
            };
            let stopper = {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.shutdown(Duration::from_secs(2)).await })
            };

            let run_result = runner.await.unwrap();
            stopper.await.unwrap().unwrap();

            match run_result {
                // A dispatcher that started must have run the queued job.
                Ok(()) => assert_eq!(ran.load(Ordering::SeqCst), 1),
                Err(err) => {
                    assert!(matches!(err, PoolError::Stopped));
                    assert_eq!(ran.load(Ordering::SeqCst), 0);
                }
            }
            assert_eq!(pool.status(), PoolStatus::Stopped);
        }
    }

    #[cfg(feature = "metrics")]
    #[tokio::test]
    async fn test_discard_resets_queue_depth_gauge() {
        let pool = WorkerPool::new(PoolConfig::new("discard-depth"));
        pool.try_add_job(vec![noop()]).unwrap();
        pool.try_add_job(vec![noop()]).unwrap();
        let gauge = crate::metrics::QUEUE_DEPTH.with_label_values(&["discard-depth"]);
        assert_eq!(gauge.get(), 2.0);

        pool.shutdown(Duration::from_millis(100)).await.unwrap();
        assert_eq!(gauge.get(), 0.0);
    }
}
