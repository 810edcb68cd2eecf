//! Incremental tracker-issue sync.
//!
//! The tracker side has no conditional fetch, so freshness is driven by its
//! recent-activity feed instead: each pass reads one page of the feed
//! (newest first), keeps the entries strictly newer than the stored
//! watermark, fans out one refresh task per distinct issue key, and advances
//! the watermark to the newest update time dispatched. An issue edited on
//! the tracker with no PR activity at all still reaches the mirror this way.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::orchestrator::advance_watermark;
use super::SyncError;
use crate::config::MirrorConfig;
use crate::queue::{QueueName, RefreshTask, TaskQueue};
use crate::store::{KvStore, ISSUE_SYNC_WATERMARK};
use crate::tracker::TrackerApi;
use crate::types::ids::IssueKey;

/// How much of the activity feed one pass looks at. Issues that fall off the
/// end between passes are caught by the next PR-driven refresh or backfill.
const FEED_PAGE_SIZE: u32 = 20;

/// What an issue sync pass enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IssueSyncReport {
    pub enqueued: usize,
    pub watermark: Option<DateTime<Utc>>,
}

pub struct IssueSyncOrchestrator {
    tracker: Arc<dyn TrackerApi>,
    kv: Arc<dyn KvStore>,
    queue: Arc<dyn TaskQueue>,
    tracker_project: String,
    max_enqueue_batch: usize,
}

impl IssueSyncOrchestrator {
    pub fn new(
        tracker: Arc<dyn TrackerApi>,
        kv: Arc<dyn KvStore>,
        queue: Arc<dyn TaskQueue>,
        config: &MirrorConfig,
    ) -> Self {
        IssueSyncOrchestrator {
            tracker,
            kv,
            queue,
            tracker_project: config.tracker_project.clone(),
            max_enqueue_batch: config.max_enqueue_batch,
        }
    }

    /// Runs one pass over the tracker's activity feed.
    pub async fn run_once(&self) -> Result<IssueSyncReport, SyncError> {
        let watermark = self.load_watermark().await?;
        let entries = self
            .tracker
            .recent_activity(&self.tracker_project, FEED_PAGE_SIZE)
            .await?;

        // Only entries strictly newer than the watermark are new work; the
        // boundary entry itself was dispatched by the pass that set it.
        let mut max_seen = None;
        let mut keys: Vec<IssueKey> = Vec::new();
        for entry in entries {
            if let Some(watermark) = watermark {
                if entry.updated_at <= watermark {
                    continue;
                }
            }
            max_seen = Some(advance_watermark(max_seen, entry.updated_at));
            if !keys.contains(&entry.key) {
                keys.push(entry.key);
            }
        }

        let Some(max_seen) = max_seen else {
            debug!(watermark = ?watermark, "no tracker activity since last pass");
            return Ok(IssueSyncReport {
                enqueued: 0,
                watermark,
            });
        };

        let tasks: Vec<RefreshTask> = keys
            .into_iter()
            .map(|key| RefreshTask::TrackerIssue { key })
            .collect();
        let enqueued = tasks.len();
        for chunk in tasks.chunks(self.max_enqueue_batch) {
            self.queue
                .enqueue_batch(
                    QueueName::TrackerIssues,
                    chunk.to_vec(),
                    self.max_enqueue_batch,
                )
                .await?;
        }

        self.kv
            .put(ISSUE_SYNC_WATERMARK, max_seen.to_rfc3339())
            .await?;

        info!(enqueued, watermark = %max_seen.to_rfc3339(), "issue sync pass complete");
        Ok(IssueSyncReport {
            enqueued,
            watermark: Some(max_seen),
        })
    }

    async fn load_watermark(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        let Some(raw) = self.kv.get(ISSUE_SYNC_WATERMARK).await? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
            Err(error) => {
                warn!(%raw, %error, "stored watermark is unparseable; processing the whole page");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;
    use crate::store::InMemoryKvStore;
    use crate::tracker::{
        ActivityEntry, NewRemoteLink, RemoteLink, TrackerError, Transition,
    };
    use crate::types::issue::IssueDetail;
    use chrono::TimeZone;

    struct FeedTracker {
        entries: Vec<ActivityEntry>,
    }

    #[async_trait::async_trait]
    impl TrackerApi for FeedTracker {
        async fn issue(&self, _key: &IssueKey) -> Result<IssueDetail, TrackerError> {
            Ok(IssueDetail::default())
        }

        async fn recent_activity(
            &self,
            _project: &str,
            max_results: u32,
        ) -> Result<Vec<ActivityEntry>, TrackerError> {
            Ok(self
                .entries
                .iter()
                .take(max_results as usize)
                .cloned()
                .collect())
        }

        async fn remote_links(&self, _key: &IssueKey) -> Result<Vec<RemoteLink>, TrackerError> {
            Ok(Vec::new())
        }

        async fn add_remote_link(
            &self,
            _key: &IssueKey,
            _link: &NewRemoteLink,
        ) -> Result<(), TrackerError> {
            Ok(())
        }

        async fn add_comment(&self, _key: &IssueKey, _body: &str) -> Result<(), TrackerError> {
            Ok(())
        }

        async fn transitions(&self, _key: &IssueKey) -> Result<Vec<Transition>, TrackerError> {
            Ok(Vec::new())
        }

        async fn apply_transition(
            &self,
            _key: &IssueKey,
            _transition_id: &str,
        ) -> Result<(), TrackerError> {
            Ok(())
        }

        async fn assign(&self, _key: &IssueKey, _user: &str) -> Result<(), TrackerError> {
            Ok(())
        }
    }

    fn entry(key: &str, minutes: u32) -> ActivityEntry {
        ActivityEntry {
            key: IssueKey::new(key),
            updated_at: Utc.with_ymd_and_hms(2014, 4, 1, 12, minutes, 0).unwrap(),
        }
    }

    struct Fixture {
        orchestrator: IssueSyncOrchestrator,
        kv: Arc<InMemoryKvStore>,
        queue: Arc<InMemoryQueue>,
    }

    fn fixture(entries: Vec<ActivityEntry>) -> Fixture {
        let kv = Arc::new(InMemoryKvStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let orchestrator = IssueSyncOrchestrator::new(
            Arc::new(FeedTracker { entries }),
            kv.clone(),
            queue.clone(),
            &MirrorConfig::new(),
        );
        Fixture {
            orchestrator,
            kv,
            queue,
        }
    }

    async fn drained_keys(queue: &InMemoryQueue) -> Vec<String> {
        let mut rx = queue.take_receiver(QueueName::TrackerIssues).await.unwrap();
        let mut keys = Vec::new();
        while let Ok(task) = rx.try_recv() {
            match task {
                RefreshTask::TrackerIssue { key } => keys.push(key.0),
                other => panic!("unexpected task {other}"),
            }
        }
        keys
    }

    #[tokio::test]
    async fn first_pass_enqueues_the_whole_page_and_sets_the_watermark() {
        let f = fixture(vec![entry("SPARK-3", 30), entry("SPARK-2", 20), entry("SPARK-1", 10)]);

        let report = f.orchestrator.run_once().await.unwrap();
        assert_eq!(report.enqueued, 3);
        assert_eq!(
            drained_keys(&f.queue).await,
            vec!["SPARK-3", "SPARK-2", "SPARK-1"]
        );

        let stored = f.kv.get(ISSUE_SYNC_WATERMARK).await.unwrap().unwrap();
        assert_eq!(stored, entry("SPARK-3", 30).updated_at.to_rfc3339());
    }

    #[tokio::test]
    async fn entries_at_or_below_the_watermark_are_skipped() {
        let f = fixture(vec![entry("SPARK-3", 30), entry("SPARK-2", 20), entry("SPARK-1", 10)]);
        // Watermark at the middle entry's time: only the newest is new work.
        f.kv
            .put(
                ISSUE_SYNC_WATERMARK,
                entry("SPARK-2", 20).updated_at.to_rfc3339(),
            )
            .await
            .unwrap();

        let report = f.orchestrator.run_once().await.unwrap();
        assert_eq!(report.enqueued, 1);
        assert_eq!(drained_keys(&f.queue).await, vec!["SPARK-3"]);
    }

    #[tokio::test]
    async fn quiet_feed_is_a_no_op_and_keeps_the_watermark() {
        let f = fixture(vec![entry("SPARK-1", 10)]);
        let existing = entry("SPARK-1", 10).updated_at.to_rfc3339();
        f.kv
            .put(ISSUE_SYNC_WATERMARK, existing.clone())
            .await
            .unwrap();

        let report = f.orchestrator.run_once().await.unwrap();
        assert_eq!(report.enqueued, 0);
        assert!(drained_keys(&f.queue).await.is_empty());
        assert_eq!(
            f.kv.get(ISSUE_SYNC_WATERMARK).await.unwrap().unwrap(),
            existing
        );
    }

    #[tokio::test]
    async fn an_issue_touched_twice_is_enqueued_once() {
        let f = fixture(vec![
            entry("SPARK-7", 30),
            entry("SPARK-7", 25),
            entry("SPARK-6", 20),
        ]);

        let report = f.orchestrator.run_once().await.unwrap();
        assert_eq!(report.enqueued, 2);
        assert_eq!(drained_keys(&f.queue).await, vec!["SPARK-7", "SPARK-6"]);
    }

    #[tokio::test]
    async fn rerunning_after_a_pass_enqueues_nothing_new() {
        let f = fixture(vec![entry("SPARK-2", 20), entry("SPARK-1", 10)]);

        f.orchestrator.run_once().await.unwrap();
        let report = f.orchestrator.run_once().await.unwrap();

        assert_eq!(report.enqueued, 0);
        // Only the first pass's tasks are on the queue.
        assert_eq!(drained_keys(&f.queue).await, vec!["SPARK-2", "SPARK-1"]);
    }
}
