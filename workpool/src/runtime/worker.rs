use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::Instrument;

use crate::events::PoolEventPayload;
use crate::job::Job;
use crate::slots::SlotGuard;
use crate::task::TaskContext;
use crate::telemetry;

use super::supervisor::{InFlightGuard, PoolShared, ShutdownToken};

/// Counts a job as active for as long as it holds a slot.
struct ActiveGuard<'a> {
    shared: &'a PoolShared,
    _slot: SlotGuard,
}

impl<'a> ActiveGuard<'a> {
    fn enter(shared: &'a PoolShared, slot: SlotGuard) -> Self {
        let active = shared.state.enter_active();
        telemetry::set_active_jobs(&*shared.name, active);
        Self {
            shared,
            _slot: slot,
        }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let active = self.shared.state.leave_active();
        telemetry::set_active_jobs(&*self.shared.name, active);
    }
}

/// Execute one dispatched job.
///
/// Waits for a concurrency slot, then runs the job's tasks in order. A task
/// that errors or panics is logged and the next task still runs. If `token`
/// fires before a slot frees up, the job is abandoned without running any
/// task. The in-flight guard is released last, after the completion event.
pub(crate) async fn execute_job(
    shared: Arc<PoolShared>,
    job: Job,
    token: ShutdownToken,
    in_flight: InFlightGuard,
) {
    let job_id = job.id();

    let slot = if token.is_cancelled() {
        None
    } else if let Some(slot) = shared.slots.try_acquire() {
        Some(slot)
    } else {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            slot = shared.slots.acquire() => Some(slot),
        }
    };
    let Some(slot) = slot else {
        tracing::warn!(pool = %shared.name, job_id = %job_id, "failed to acquire slot");
        shared.publish(PoolEventPayload::JobAbandoned { job_id });
        drop(in_flight);
        return;
    };

    let active = ActiveGuard::enter(&shared, slot);
    let timing = telemetry::record_job_start();
    let failed_tasks = telemetry::instrument_job(
        &*shared.name,
        job_id.to_string(),
        job.len(),
        run_tasks(&shared, &job, &token),
    )
    .await;
    drop(active);

    let timing_status = if failed_tasks == 0 {
        "success"
    } else {
        "partial_failure"
    };
    let elapsed = telemetry::record_job_end(timing, &*shared.name, timing_status);
    shared.publish(PoolEventPayload::JobCompleted {
        job_id,
        failed_tasks,
        elapsed,
    });
    drop(in_flight);
}

/// Run every task of `job` sequentially and return how many failed.
async fn run_tasks(shared: &PoolShared, job: &Job, token: &ShutdownToken) -> usize {
    let job_id = job.id();
    let mut failed = 0;

    for (index, task) in job.tasks().iter().enumerate() {
        let ctx = TaskContext::new(token.clone(), job_id, index, Arc::clone(&shared.name));
        let task_name = task.name().to_string();

        let outcome = AssertUnwindSafe(
            task.execute(&ctx)
                .instrument(telemetry::task_span(&task_name, index)),
        )
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(anyhow::anyhow!("task panicked: {}", panic_message(&panic))));

        match outcome {
            Ok(()) => {
                tracing::info!(
                    pool = %shared.name,
                    job_id = %job_id,
                    task = %task_name,
                    index = index,
                    "task executed successfully"
                );
                telemetry::record_task_completed(&*shared.name, "success");
                shared.publish(PoolEventPayload::TaskSucceeded {
                    job_id,
                    index,
                    task: task_name,
                });
            }
            Err(err) => {
                failed += 1;
                tracing::error!(
                    pool = %shared.name,
                    job_id = %job_id,
                    task = %task_name,
                    index = index,
                    error = %format!("{err:#}"),
                    "task execution failed"
                );
                telemetry::record_task_completed(&*shared.name, "failure");
                shared.publish(PoolEventPayload::TaskFailed {
                    job_id,
                    index,
                    task: task_name,
                    error: format!("{err:#}"),
                });
            }
        }
    }

    failed
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::events::{InProcEventBus, PoolEvent, PoolEventPublisher};
    use crate::runtime::WorkerPool;
    use crate::task::task_fn;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::broadcast;

    async fn next_matching(
        rx: &mut broadcast::Receiver<PoolEvent>,
        mut matches: impl FnMut(&PoolEventPayload) -> bool,
    ) -> PoolEventPayload {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = rx.recv().await.expect("event bus closed");
                if matches(&event.payload) {
                    return event.payload;
                }
            }
        })
        .await
        .expect("expected event within 5 seconds")
    }

    #[test]
    fn test_panic_message_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        let other: Box<dyn Any + Send> = Box::new(42_u32);

        assert_eq!(panic_message(&static_str), "boom");
        assert_eq!(panic_message(&owned), "owned boom");
        assert_eq!(panic_message(&other), "unknown panic payload");
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_job() {
        let bus = Arc::new(InProcEventBus::new(64));
        let mut rx = bus.subscribe();
        let pool = WorkerPool::builder().with_events(bus.clone()).build();
        let order = Arc::new(Mutex::new(Vec::new()));

        let record = |label: &'static str, fail: bool| {
            let order = Arc::clone(&order);
            task_fn(label, move |_ctx| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().push(label);
                    if fail {
                        anyhow::bail!("{label} failed");
                    }
                    Ok(())
                }
            })
        };

        pool.run(ShutdownToken::new()).await.unwrap();
        pool.add_job(vec![record("a", false), record("b", true), record("c", false)])
            .await
            .unwrap();

        let completed = next_matching(&mut rx, |p| {
            matches!(p, PoolEventPayload::JobCompleted { .. })
        })
        .await;
        assert!(matches!(
            completed,
            PoolEventPayload::JobCompleted { failed_tasks: 1, .. }
        ));
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);

        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let bus = Arc::new(InProcEventBus::new(64));
        let mut rx = bus.subscribe();
        let pool = WorkerPool::builder()
            .with_config(PoolConfig::default().with_concurrency(1))
            .with_events(bus.clone())
            .build();

        pool.run(ShutdownToken::new()).await.unwrap();
        pool.add_job(vec![
            task_fn("explode", |_ctx| async {
                if true {
                    panic!("kaboom");
                }
                Ok(())
            }),
            task_fn("after", |_ctx| async { Ok(()) }),
        ])
        .await
        .unwrap();

        let failed = next_matching(&mut rx, |p| matches!(p, PoolEventPayload::TaskFailed { .. }))
            .await;
        match failed {
            PoolEventPayload::TaskFailed { index, error, .. } => {
                assert_eq!(index, 0);
                assert!(error.contains("kaboom"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        next_matching(&mut rx, |p| {
            matches!(p, PoolEventPayload::TaskSucceeded { index: 1, .. })
        })
        .await;

        pool.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(pool.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_waiting_job_abandoned_on_cancel() {
        let bus = Arc::new(InProcEventBus::new(64));
        let mut rx = bus.subscribe();
        let pool = WorkerPool::builder()
            .with_config(PoolConfig::default().with_concurrency(1))
            .with_events(bus.clone())
            .build();
        let token = ShutdownToken::new();
        let ran_second = Arc::new(Mutex::new(false));

        pool.run(token.clone()).await.unwrap();
        pool.add_job(vec![task_fn("hold", |ctx| async move {
            ctx.cancelled().await;
            Ok(())
        })])
        .await
        .unwrap();
        next_matching(&mut rx, |p| matches!(p, PoolEventPayload::JobDispatched { .. })).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while pool.active_jobs() != 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first job should hold the only slot");

        let flag = Arc::clone(&ran_second);
        let second = pool
            .add_job(vec![task_fn("never", move |_ctx| {
                let flag = Arc::clone(&flag);
                async move {
                    *flag.lock() = true;
                    Ok(())
                }
            })])
            .await
            .unwrap();
        next_matching(&mut rx, |p| {
            matches!(p, PoolEventPayload::JobDispatched { job_id } if *job_id == second)
        })
        .await;

        token.cancel();
        let abandoned = next_matching(&mut rx, |p| {
            matches!(p, PoolEventPayload::JobAbandoned { .. })
        })
        .await;
        assert!(matches!(
            abandoned,
            PoolEventPayload::JobAbandoned { job_id } if job_id == second
        ));
        assert!(!*ran_second.lock());

        pool.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(pool.in_flight_jobs(), 0);
    }
}
