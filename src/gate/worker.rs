//! Bounded worker pool for message handling.

use std::sync::Arc;
use tokio::sync::Semaphore;

/// Caps concurrent in-flight message handlers. Acquiring a permit before
/// spawning applies backpressure to the connection read loop instead of
/// queueing unbounded work.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    /// Run `task` on the pool, waiting for a free slot first.
    pub async fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        // acquire never fails: the semaphore is never closed
        if let Ok(permit) = self.permits.clone().acquire_owned().await {
            tokio::spawn(async move {
                task.await;
                drop(permit);
            });
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
