use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use workpool::{SharedTask, Task, TaskContext};

/// Counts how many of its tasks run at the same time.
#[derive(Clone, Debug, Default)]
pub struct ConcurrencyTracker {
    inner: Arc<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    current: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task that holds the tracker for `hold` before completing.
    pub fn task(&self, hold: Duration) -> SharedTask {
        Arc::new(TrackedTask {
            tracker: self.clone(),
            hold,
        })
    }

    pub fn current(&self) -> usize {
        self.inner.current.load(Ordering::SeqCst)
    }

    /// Highest number of tracked tasks observed running at once.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.inner.completed.load(Ordering::SeqCst)
    }

    pub fn assert_peak_le(&self, limit: usize) {
        assert!(
            self.peak() <= limit,
            "Expected at most {} concurrent tasks, observed {}",
            limit,
            self.peak()
        );
    }

    fn enter(&self) {
        let now = self.inner.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.inner.current.fetch_sub(1, Ordering::SeqCst);
        self.inner.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Task handed out by [`ConcurrencyTracker::task`].
#[derive(Clone, Debug)]
pub struct TrackedTask {
    tracker: ConcurrencyTracker,
    hold: Duration,
}

#[async_trait]
impl Task for TrackedTask {
    async fn execute(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
        self.tracker.enter();
        tokio::time::sleep(self.hold).await;
        self.tracker.leave();
        Ok(())
    }

    fn name(&self) -> &str {
        "tracked"
    }
}
