use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A permit allowing one job to execute.
///
/// The slot is returned to the limiter when the guard is dropped, including
/// when the owning task unwinds.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
}

/// Counting limiter that gates how many jobs execute at once.
///
/// Capacity is fixed at construction. Acquisition is fair: waiters are
/// served in the order they started waiting.
#[derive(Clone, Debug)]
pub struct ConcurrencySlots {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencySlots {
    /// Create a limiter with `capacity` slots (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    ///
    /// Dropping the returned future before it resolves takes no slot.
    pub async fn acquire(&self) -> SlotGuard {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("slot semaphore is owned here and never closed");
        SlotGuard { _permit: permit }
    }

    /// Take a free slot if one is available right now.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| SlotGuard { _permit: permit })
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let slots = ConcurrencySlots::new(2);
        let first: SlotGuard = slots.acquire().await;
        let second = slots.acquire().await;
        assert_eq!(slots.available(), 0);
        assert_eq!(slots.in_use(), 2);
        assert!(slots.try_acquire().is_none());

        drop(first);
        assert_eq!(slots.available(), 1);
        drop(second);
        assert_eq!(slots.available(), 2);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let slots = ConcurrencySlots::new(1);
        let held = slots.acquire().await;

        let waiter = {
            let slots = slots.clone();
            tokio::spawn(async move {
                let _slot = slots.acquire().await;
                slots.in_use()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let in_use = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should get the released slot")
            .expect("waiter panicked");
        assert_eq!(in_use, 1);
        assert_eq!(slots.available(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_acquire_takes_nothing() {
        let slots = ConcurrencySlots::new(1);
        let held = slots.acquire().await;

        let abandoned = timeout(Duration::from_millis(20), slots.acquire()).await;
        assert!(abandoned.is_err());

        drop(held);
        assert_eq!(slots.available(), 1);
    }

    #[test]
    fn test_zero_capacity_coerced() {
        let slots = ConcurrencySlots::new(0);
        assert_eq!(slots.capacity(), 1);
        assert_eq!(slots.available(), 1);
    }
}
