//! Health-check worker example.
//!
//! Starts a pool, enqueues a single health task, then drains it with a
//! ten-second deadline. Run with `RUST_LOG=debug` to see the pool's own
//! log lines.

use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;
use workpool::*;

/// Task that only reports it ran.
struct HealthTask;

#[async_trait]
impl Task for HealthTask {
    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        tracing::info!(pool = %ctx.pool_name(), job_id = %ctx.job_id(), "health task executed");
        Ok(())
    }

    fn name(&self) -> &str {
        "health"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Workpool Health Worker Example ===\n");

    let token = ShutdownToken::new();
    let pool = WorkerPool::new(PoolConfig::default());

    let job_id = pool.add_job(vec![std::sync::Arc::new(HealthTask) as SharedTask]).await?;
    println!("Enqueued health job {job_id}");

    if let Err(err) = pool.run(token.clone()).await {
        eprintln!("failed to run worker: {err}");
        std::process::exit(1);
    }

    println!("worker started");
    println!("Queue length: {}", pool.queue_length());

    if let Err(err) = pool.shutdown(Duration::from_secs(10)).await {
        tracing::error!(error = %err, "shutdown error");
    }
    token.cancel();

    println!(
        "After shutdown - Running: {}, Status: {}",
        pool.is_running(),
        pool.status()
    );
    Ok(())
}
