use tracing::instrument;

use crate::crawler::downloader::Downloader;
use crate::crawler::task::TaskManager;
use crate::model::{DownloadResult, ImageTask, Outcome};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[DownloadResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.outcome.is_success()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

/// Download every task with at most `concurrency_limit` transfers in flight.
///
/// All tasks are queued before waiting and the call returns only when each one has
/// finished. A failed image never affects its siblings. The result holds exactly one
/// entry per task, in the order the tasks were given.
#[instrument(skip_all, fields(tasks = tasks.len(), concurrency_limit = concurrency_limit))]
pub async fn run_batch(
    downloader: &Downloader,
    tasks: Vec<ImageTask>,
    concurrency_limit: usize,
    max_retries: u32,
) -> Vec<DownloadResult> {
    let mut manager = TaskManager::new(concurrency_limit);
    for (slot, task) in tasks.iter().cloned().enumerate() {
        let downloader = downloader.clone();
        manager.spawn(async move {
            let mut task = task;
            let outcome = downloader.fetch_to_file(&mut task, max_retries).await;
            (slot, DownloadResult { task, outcome })
        });
    }

    let mut slots: Vec<Option<DownloadResult>> = (0..tasks.len()).map(|_| None).collect();
    for (slot, result) in manager.wait().await {
        slots[slot] = Some(result);
    }

    slots
        .into_iter()
        .zip(tasks)
        .map(|(result, task)| {
            result.unwrap_or_else(|| DownloadResult {
                task,
                outcome: Outcome::Failed("worker task did not finish".to_owned()),
            })
        })
        .collect()
}
