use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use uuid::Uuid;

use crate::error::PoolError;
use crate::task::SharedTask;

/// Identifier assigned to every job when it is built.
///
/// UUID v7, so ids sort by creation time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered batch of tasks executed sequentially on one concurrency slot.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    tasks: Vec<SharedTask>,
    created_at: DateTime<Utc>,
}

impl Job {
    /// Package `tasks` into a job. The list must not be empty.
    pub fn new(tasks: impl IntoIterator<Item = SharedTask>) -> Result<Self, PoolError> {
        let tasks: Vec<SharedTask> = tasks.into_iter().collect();
        if tasks.is_empty() {
            return Err(PoolError::EmptyJob);
        }
        Ok(Self {
            id: JobId::new(),
            tasks,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn tasks(&self) -> &[SharedTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Always false for a constructed job; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tasks.iter().map(|task| task.name()).collect();
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("tasks", &names)
            .field("created_at", &self.created_at)
            .finish()
    }
}
