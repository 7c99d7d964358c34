//! Test tasks and trackers for exercising `workpool`.

mod tracker;
mod task;

pub use tracker::{ConcurrencyTracker, TrackedTask};
pub use task::{FailingTask, GateTask, PanickingTask, RecordingTask, SleepTask, TaskLog};

use std::time::Duration;

/// Poll `condition` every few milliseconds until it holds or `limit` passes.
///
/// Returns whether the condition was met.
pub async fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
