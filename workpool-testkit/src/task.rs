use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use workpool::{SharedTask, Task, TaskContext};

/// Sleeps for a fixed duration, then succeeds.
#[derive(Clone, Debug)]
pub struct SleepTask {
    name: String,
    duration: Duration,
}

impl SleepTask {
    pub fn new(duration: Duration) -> Self {
        Self {
            name: "sleep".to_string(),
            duration,
        }
    }

    pub fn millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn shared(self) -> SharedTask {
        Arc::new(self)
    }
}

#[async_trait]
impl Task for SleepTask {
    async fn execute(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
        tokio::time::sleep(self.duration).await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Always returns an error with the configured message.
#[derive(Clone, Debug)]
pub struct FailingTask {
    error: String,
}

impl FailingTask {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    pub fn shared(self) -> SharedTask {
        Arc::new(self)
    }
}

#[async_trait]
impl Task for FailingTask {
    async fn execute(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("{}", self.error))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Panics with the configured message.
#[derive(Clone, Debug)]
pub struct PanickingTask {
    message: String,
}

impl PanickingTask {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn shared(self) -> SharedTask {
        Arc::new(self)
    }
}

#[async_trait]
impl Task for PanickingTask {
    async fn execute(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
        panic!("{}", self.message);
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// Shared, ordered log of labels written by [`RecordingTask`]s.
#[derive(Clone, Debug, Default)]
pub struct TaskLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl TaskLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task that appends `label` to this log when executed.
    pub fn task(&self, label: impl Into<String>) -> SharedTask {
        Arc::new(RecordingTask {
            label: label.into(),
            log: self.clone(),
        })
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn assert_entries_eq(&self, expected: &[&str]) {
        let entries = self.entries();
        assert_eq!(
            entries, expected,
            "Expected log {:?}, got {:?}",
            expected, entries
        );
    }

    fn push(&self, label: &str) {
        self.entries.lock().push(label.to_string());
    }
}

/// Appends its label to a [`TaskLog`], then succeeds.
#[derive(Clone, Debug)]
pub struct RecordingTask {
    label: String,
    log: TaskLog,
}

#[async_trait]
impl Task for RecordingTask {
    async fn execute(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
        self.log.push(&self.label);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Blocks until released, or until the pool's token is cancelled.
///
/// Lets a test hold a slot for as long as it needs to observe pool state.
#[derive(Clone, Debug, Default)]
pub struct GateTask {
    gate: Arc<Gate>,
}

#[derive(Debug, Default)]
struct Gate {
    open: Mutex<bool>,
    notify: Notify,
    entered: std::sync::atomic::AtomicUsize,
}

impl GateTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task sharing this gate.
    pub fn task(&self) -> SharedTask {
        Arc::new(self.clone())
    }

    /// Let every current and future waiter through.
    pub fn open(&self) {
        *self.gate.open.lock() = true;
        self.gate.notify.notify_waiters();
    }

    /// How many tasks have started waiting at this gate.
    pub fn entered(&self) -> usize {
        self.gate.entered.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn is_open(&self) -> bool {
        *self.gate.open.lock()
    }
}

#[async_trait]
impl Task for GateTask {
    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        self.gate
            .entered
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        loop {
            let notified = self.gate.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_open() || ctx.is_cancelled() {
                return Ok(());
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = ctx.cancelled() => return Ok(()),
            }
        }
    }

    fn name(&self) -> &str {
        "gate"
    }
}
