use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::PoolError;
use crate::job::Job;

/// Bounded FIFO buffer of pending jobs.
///
/// Producers wait on `space` when the buffer is full; the single consumer
/// (the dispatch loop) waits on `items` when it is empty. Closing wakes both
/// sides: producers fail with [`PoolError::Closed`], the consumer keeps
/// receiving buffered jobs and then gets `None`.
pub struct JobQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    space: Notify,
    items: Notify,
}

struct QueueState {
    jobs: VecDeque<Job>,
    closed: bool,
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("JobQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.jobs.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl JobQueue {
    /// Create a queue holding at most `capacity` jobs (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            space: Notify::new(),
            items: Notify::new(),
        }
    }

    /// Enqueue `job`, waiting while the queue is full.
    pub async fn push(&self, job: Job) -> Result<(), PoolError> {
        self.push_with(job, |_, _| {}).await
    }

    /// Enqueue `job`, waiting while the queue is full, and call `on_accept`
    /// with the job and the new depth before the consumer can see it.
    ///
    /// `on_accept` runs under the queue lock and must not touch the queue.
    pub async fn push_with<F>(&self, job: Job, on_accept: F) -> Result<(), PoolError>
    where
        F: FnOnce(&Job, usize),
    {
        let mut pending = Some((job, on_accept));
        loop {
            let notified = self.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                if state.jobs.len() < self.capacity {
                    if let Some((job, on_accept)) = pending.take() {
                        on_accept(&job, state.jobs.len() + 1);
                        state.jobs.push_back(job);
                    }
                    drop(state);
                    self.items.notify_one();
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Enqueue `job` without waiting.
    pub fn try_push(&self, job: Job) -> Result<(), PoolError> {
        self.try_push_with(job, |_, _| {})
    }

    /// Non-blocking counterpart of [`JobQueue::push_with`].
    pub fn try_push_with<F>(&self, job: Job, on_accept: F) -> Result<(), PoolError>
    where
        F: FnOnce(&Job, usize),
    {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        if state.jobs.len() >= self.capacity {
            return Err(PoolError::QueueFull);
        }
        on_accept(&job, state.jobs.len() + 1);
        state.jobs.push_back(job);
        drop(state);
        self.items.notify_one();
        Ok(())
    }

    /// Take the oldest job, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and every buffered job has
    /// been handed out.
    pub async fn pop(&self) -> Option<Job> {
        loop {
            let notified = self.items.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(job) = state.jobs.pop_front() {
                    drop(state);
                    self.space.notify_one();
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stop accepting jobs. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.space.notify_waiters();
        self.items.notify_waiters();
    }

    /// Drop every buffered job, returning how many were discarded.
    pub fn discard(&self) -> usize {
        let discarded = {
            let mut state = self.state.lock();
            let count = state.jobs.len();
            state.jobs.clear();
            count
        };
        if discarded > 0 {
            self.space.notify_waiters();
        }
        discarded
    }

    /// Number of jobs waiting to be dispatched.
    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
