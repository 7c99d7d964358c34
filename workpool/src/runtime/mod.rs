/// Builder for constructing worker pools.
pub mod builder;
/// Pool lifecycle, dispatch loop and shutdown signaling.
pub mod supervisor;
/// Execution of a single dispatched job.
mod worker;

pub use builder::WorkerPoolBuilder;
pub use supervisor::{PoolStatus, ShutdownToken, WorkerPool};
