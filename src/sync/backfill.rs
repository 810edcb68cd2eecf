//! Full backfill: seed the mirror from an empty store.
//!
//! PR numbers are assigned densely from 1, so a single "newest number" query
//! bounds the whole space and the backfill fans out one refresh task per
//! number. Numbers that never existed or were deleted upstream surface as
//! not-found during refresh, which the workers treat as a skip.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::info;

use super::SyncError;
use crate::config::MirrorConfig;
use crate::github::PrSource;
use crate::queue::{QueueName, RefreshTask, TaskQueue};
use crate::store::MirrorStore;
use crate::types::ids::IssueKey;

pub struct BackfillOrchestrator {
    source: Arc<dyn PrSource>,
    store: Arc<dyn MirrorStore>,
    queue: Arc<dyn TaskQueue>,
    max_enqueue_batch: usize,
    tracker_project: String,
}

impl BackfillOrchestrator {
    pub fn new(
        source: Arc<dyn PrSource>,
        store: Arc<dyn MirrorStore>,
        queue: Arc<dyn TaskQueue>,
        config: &MirrorConfig,
    ) -> Self {
        BackfillOrchestrator {
            source,
            store,
            queue,
            max_enqueue_batch: config.max_enqueue_batch,
            tracker_project: config.tracker_project.clone(),
        }
    }

    /// Enqueues a refresh for every PR number from 1 up to the newest known
    /// upstream. Batches are submitted concurrently and all joined before
    /// returning, so a reported success means every batch was accepted.
    ///
    /// Returns the number of tasks enqueued.
    pub async fn backfill_all_prs(&self) -> Result<usize, SyncError> {
        let Some(newest) = self.source.newest_pr_number().await? else {
            info!("upstream repository has no pull requests; nothing to backfill");
            return Ok(0);
        };

        let tasks: Vec<RefreshTask> = (1..=newest.0)
            .map(|n| RefreshTask::Pr { number: n.into() })
            .collect();
        let total = tasks.len();

        let mut batches = JoinSet::new();
        for chunk in tasks.chunks(self.max_enqueue_batch) {
            let queue = Arc::clone(&self.queue);
            let batch = chunk.to_vec();
            let limit = self.max_enqueue_batch;
            batches.spawn(async move { queue.enqueue_batch(QueueName::OldPrs, batch, limit).await });
        }
        while let Some(joined) = batches.join_next().await {
            joined??;
        }

        info!(newest = %newest, total, "backfill enqueued");
        Ok(total)
    }

    /// Enqueues a refresh for every tracker issue referenced by an open PR,
    /// each key once.
    pub async fn backfill_tracker_issues(&self) -> Result<usize, SyncError> {
        let open = self.store.open_prs_by_update_desc().await?;

        let mut keys: Vec<IssueKey> = Vec::new();
        for pr in &open {
            for id in &pr.derived.parsed_title.tracker_ids {
                let key = IssueKey::from_parts(&self.tracker_project, *id);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let tasks: Vec<RefreshTask> = keys
            .into_iter()
            .map(|key| RefreshTask::TrackerIssue { key })
            .collect();
        let total = tasks.len();
        for chunk in tasks.chunks(self.max_enqueue_batch) {
            self.queue
                .enqueue_batch(
                    QueueName::TrackerIssues,
                    chunk.to_vec(),
                    self.max_enqueue_batch,
                )
                .await?;
        }

        info!(total, "tracker-issue backfill enqueued");
        Ok(total)
    }
}
