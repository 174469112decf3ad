use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// A bounded pool of concurrency slots for one resource class (uploads,
/// downloads, or thumbnail generation), each independently sized from
/// `Config` (spec.md §5 "Resource model"). Grounded on the teacher's
/// `max_global_concurrency`-style gate, generalized into one semaphore per
/// resource instead of a single global one.
#[derive(Clone)]
pub struct SlotLimiter {
    semaphore: Arc<Semaphore>,
}

impl SlotLimiter {
    pub fn new(slots: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(slots.max(1))),
        }
    }

    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("slot semaphore never closes")
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// The three resource classes the engine throttles independently.
#[derive(Clone)]
pub struct SlotLimiters {
    pub upload: SlotLimiter,
    pub download: SlotLimiter,
    pub thumbnail: SlotLimiter,
}

impl SlotLimiters {
    pub fn new(upload_slots: usize, download_slots: usize, thumbnail_slots: usize) -> Self {
        Self {
            upload: SlotLimiter::new(upload_slots),
            download: SlotLimiter::new(download_slots),
            thumbnail: SlotLimiter::new(thumbnail_slots),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limits_concurrent_holders_to_configured_slots() {
        let limiter = SlotLimiter::new(2);
        let _a = limiter.acquire().await;
        let _b = limiter.acquire().await;
        assert_eq!(limiter.available(), 0);
        drop(_a);
        assert_eq!(limiter.available(), 1);
    }
}
