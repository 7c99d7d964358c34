use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::job::JobId;
use crate::runtime::ShutdownToken;

/// The atomic unit of work executed by the pool.
///
/// Tasks are supplied by the embedding application. The pool never retries a
/// task and never enforces a timeout on it; long-running tasks should watch
/// [`TaskContext::cancelled`] and return early when the pool is stopped.
///
/// # Example
///
/// ```ignore
/// struct HealthCheck;
///
/// #[async_trait]
/// impl Task for HealthCheck {
///     async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()> {
///         tracing::info!(pool = %ctx.pool_name(), "health task executed");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    /// Run the task to completion.
    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()>;

    /// Name used in log lines and events.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A task shared between the producer and the pool.
pub type SharedTask = Arc<dyn Task>;

/// Per-task view of the surrounding execution.
#[derive(Clone, Debug)]
pub struct TaskContext {
    token: ShutdownToken,
    job_id: JobId,
    index: usize,
    pool_name: Arc<str>,
}

impl TaskContext {
    /// Create a context for the task at `index` within `job_id`.
    pub fn new(
        token: ShutdownToken,
        job_id: JobId,
        index: usize,
        pool_name: Arc<str>,
    ) -> Self {
        Self {
            token,
            job_id,
            index,
            pool_name,
        }
    }

    /// The job this task belongs to.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Position of this task inside its job, starting at zero.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the pool executing the task.
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// The token the pool was started with.
    pub fn token(&self) -> &ShutdownToken {
        &self.token
    }

    /// Whether the pool's run token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the pool's run token is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Adapter turning an async closure into a [`Task`].
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F> FnTask<F> {
    /// Wrap `f` under the given task name.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        (self.f)(ctx.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a named shared task from an async closure.
pub fn task_fn<F, Fut>(name: impl Into<String>, f: F) -> SharedTask
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnTask::new(name, f))
}
