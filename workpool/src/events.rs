use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::job::JobId;

/// Metadata envelope attached to every pool event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    pub version: u16,
    pub event_id: Uuid,
    pub pool: String,
    pub timestamp: DateTime<Utc>,
}

impl EventMeta {
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            version: 1,
            event_id: Uuid::now_v7(),
            pool: pool.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Pool event with metadata and payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolEvent {
    pub meta: EventMeta,
    pub payload: PoolEventPayload,
}

impl PoolEvent {
    pub fn new(pool: impl Into<String>, payload: PoolEventPayload) -> Self {
        Self {
            meta: EventMeta::new(pool),
            payload,
        }
    }
}

/// Why the dispatch loop stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    /// The run token was cancelled.
    Cancelled,
    /// The queue was closed by `shutdown` and fully drained.
    QueueClosed,
}

/// Event payload emitted for pool and job lifecycle transitions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PoolEventPayload {
    /// The dispatch loop was started.
    Started {
        max_jobs: usize,
        min_jobs: usize,
        concurrency: usize,
    },
    /// A job was accepted into the queue.
    JobEnqueued { job_id: JobId, tasks: usize },
    /// A non-blocking enqueue was refused because the queue was full.
    JobRejected { tasks: usize },
    /// The dispatch loop pulled a job off the queue.
    JobDispatched { job_id: JobId },
    /// A task returned `Ok`.
    TaskSucceeded {
        job_id: JobId,
        index: usize,
        task: String,
    },
    /// A task returned an error or panicked.
    TaskFailed {
        job_id: JobId,
        index: usize,
        task: String,
        error: String,
    },
    /// Every task of a job has run.
    JobCompleted {
        job_id: JobId,
        failed_tasks: usize,
        elapsed: Duration,
    },
    /// The run token fired before the job obtained a slot.
    JobAbandoned { job_id: JobId },
    /// The dispatch loop exited.
    Stopped { reason: StopReason },
    /// `shutdown` observed a full drain.
    ShutdownCompleted,
    /// `shutdown` gave up waiting.
    ShutdownTimedOut { in_flight: usize },
}

/// Trait for publishing pool events.
///
/// Publishing is synchronous so the non-blocking enqueue path and the
/// dispatch loop never wait on a sink. Implementations that forward to
/// slow destinations should buffer internally.
pub trait PoolEventPublisher: Send + Sync {
    /// Publish an event to all subscribers.
    fn publish(&self, event: PoolEvent) -> anyhow::Result<()>;

    /// Subscribe to events published after this call.
    fn subscribe(&self) -> broadcast::Receiver<PoolEvent>;
}

/// In-process event bus using a tokio broadcast channel.
///
/// Publishing never waits for subscribers. A subscriber that falls more than
/// `capacity` events behind receives `RecvError::Lagged` and skips ahead.
pub struct InProcEventBus {
    sender: broadcast::Sender<PoolEvent>,
    capacity: usize,
}

impl std::fmt::Debug for InProcEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl InProcEventBus {
    /// Create a bus buffering at most `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event. Events published with no subscriber are dropped.
    pub fn publish_event(&self, event: PoolEvent) -> anyhow::Result<()> {
        let _ = self.sender.send(event);
        Ok(())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }
}

impl Default for InProcEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl PoolEventPublisher for InProcEventBus {
    fn publish(&self, event: PoolEvent) -> anyhow::Result<()> {
        self.publish_event(event)
    }

    fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.subscribe_events()
    }
}
