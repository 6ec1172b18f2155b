use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::debug;

/// Admits at most `capacity` jobs at once and tracks `total` jobs to completion.
#[derive(Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    progress: Arc<Progress>,
}

struct Progress {
    remaining: AtomicUsize,
    done: Notify,
}

/// Held while a job runs. Dropping it frees the slot and counts the job as done.
pub struct WorkerPermit {
    slot: Option<OwnedSemaphorePermit>,
    progress: Arc<Progress>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        // Free the slot before waking waiters.
        drop(self.slot.take());
        let before = self
            .progress
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or(0);
        if before == 1 {
            debug!("All pool jobs finished");
            self.progress.done.notify_waiters();
        }
    }
}

impl WorkerPool {
    /// `capacity` below 1 is raised to 1.
    pub fn new(capacity: usize, total: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity.max(1))),
            progress: Arc::new(Progress {
                remaining: AtomicUsize::new(total),
                done: Notify::new(),
            }),
        }
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> WorkerPermit {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("pool semaphore is never closed");

        WorkerPermit {
            slot: Some(slot),
            progress: Arc::clone(&self.progress),
        }
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn remaining(&self) -> usize {
        self.progress.remaining.load(Ordering::Acquire)
    }

    /// Resolves once every one of the `total` jobs has released its permit.
    pub async fn wait(&self) {
        loop {
            let notified = self.progress.done.notified();
            if self.remaining() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// `true` when `limit` elapsed before all jobs finished.
    pub async fn wait_timeout(&self, limit: Duration) -> bool {
        timeout(limit, self.wait()).await.is_err()
    }
}
