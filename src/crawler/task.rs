use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

// One manager per batch: every task is queued before `wait`, which is the
// single join point and consumes the manager, so no worker outlives its batch.
pub struct TaskManager<R: Send + 'static> {
    tasks: JoinSet<R>,
    limit: Arc<Semaphore>,
}

impl<R: Send + 'static> TaskManager<R> {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            limit: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    /// Queue `future`; it starts once one of the `concurrency_limit` slots is free.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = R> + Send + 'static,
    {
        let limit = self.limit.clone();
        self.tasks.spawn(async move {
            // the semaphore is never closed, so acquiring only waits
            let _permit = limit.acquire_owned().await.ok();
            future.await
        });
    }

    /// Wait for every queued task. Results come back in completion order;
    /// tasks that panicked are logged and left out.
    pub async fn wait(mut self) -> Vec<R> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok(value) => results.push(value),
                Err(e) => error!("worker task did not finish: {}", e),
            }
        }
        results
    }
}
