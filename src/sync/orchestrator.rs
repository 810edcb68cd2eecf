//! The scheduled sync pass.
//!
//! Each pass walks the recently-updated feed newest-first, stopping at the
//! first item older than the stored watermark, and enqueues one refresh task
//! per item seen: recently-touched PRs to the fresh queue, the rest to the
//! old queue. The watermark is only advanced (to the maximum update time
//! observed) once the whole walk and every enqueue succeeded, so a failed
//! pass re-processes rather than skips.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::SyncError;
use crate::config::MirrorConfig;
use crate::github::PrSource;
use crate::queue::{QueueName, RefreshTask, TaskQueue};
use crate::store::{KvStore, PR_SYNC_WATERMARK};
use crate::types::pr::PrSummary;

/// What a sync pass enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub fresh: usize,
    pub stale: usize,
    /// The watermark after the pass, absent when nothing has ever been seen.
    pub watermark: Option<DateTime<Utc>>,
}

/// The new watermark after observing one feed item. Never moves backwards.
pub(crate) fn advance_watermark(
    current: Option<DateTime<Utc>>,
    seen: DateTime<Utc>,
) -> DateTime<Utc> {
    match current {
        Some(current) => current.max(seen),
        None => seen,
    }
}

pub struct SyncOrchestrator {
    source: Arc<dyn PrSource>,
    kv: Arc<dyn KvStore>,
    queue: Arc<dyn TaskQueue>,
    freshness_threshold: chrono::Duration,
    max_enqueue_batch: usize,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn PrSource>,
        kv: Arc<dyn KvStore>,
        queue: Arc<dyn TaskQueue>,
        config: &MirrorConfig,
    ) -> Self {
        SyncOrchestrator {
            source,
            kv,
            queue,
            freshness_threshold: chrono::Duration::from_std(config.freshness_threshold)
                .unwrap_or_else(|_| chrono::Duration::days(1)),
            max_enqueue_batch: config.max_enqueue_batch,
        }
    }

    /// Runs one sync pass against the feed as of `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        let watermark = self.load_watermark().await?;
        let mut max_seen = watermark;
        let mut fresh = Vec::new();
        let mut stale = Vec::new();

        let mut cursor = None;
        'walk: loop {
            let page = self.source.recently_updated_page(cursor.as_ref()).await?;
            for item in page.items {
                // The feed is sorted by update time descending, so the first
                // item strictly older than the watermark ends the walk. An
                // item exactly at the watermark is re-processed; refreshes
                // are idempotent, and re-processing beats losing an update
                // that shares the boundary timestamp.
                if let Some(watermark) = watermark {
                    if item.updated_at < watermark {
                        break 'walk;
                    }
                }
                max_seen = Some(advance_watermark(max_seen, item.updated_at));
                if self.is_fresh(now, &item) {
                    fresh.push(RefreshTask::Pr {
                        number: item.number,
                    });
                } else {
                    stale.push(RefreshTask::Pr {
                        number: item.number,
                    });
                }
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let report = SyncReport {
            fresh: fresh.len(),
            stale: stale.len(),
            watermark: max_seen,
        };

        self.enqueue_chunked(QueueName::FreshPrs, fresh).await?;
        self.enqueue_chunked(QueueName::OldPrs, stale).await?;

        if let Some(max_seen) = max_seen {
            self.kv
                .put(PR_SYNC_WATERMARK, max_seen.to_rfc3339())
                .await?;
        }

        info!(
            fresh = report.fresh,
            stale = report.stale,
            watermark = ?report.watermark,
            "sync pass complete"
        );
        Ok(report)
    }

    fn is_fresh(&self, now: DateTime<Utc>, item: &PrSummary) -> bool {
        // Strictly within the threshold: an item aged exactly the threshold
        // is already stale.
        now.signed_duration_since(item.updated_at) < self.freshness_threshold
    }

    async fn load_watermark(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        let Some(raw) = self.kv.get(PR_SYNC_WATERMARK).await? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
            Err(error) => {
                // A corrupt watermark degrades to a full walk, not a crash.
                warn!(%raw, %error, "stored watermark is unparseable; walking the whole feed");
                Ok(None)
            }
        }
    }

    async fn enqueue_chunked(
        &self,
        queue: QueueName,
        tasks: Vec<RefreshTask>,
    ) -> Result<(), SyncError> {
        for chunk in tasks.chunks(self.max_enqueue_batch) {
            self.queue
                .enqueue_batch(queue, chunk.to_vec(), self.max_enqueue_batch)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{FeedCursor, FeedPage, Fetched, FetchError};
    use crate::queue::InMemoryQueue;
    use crate::store::InMemoryKvStore;
    use crate::types::ids::{PrNumber, RevisionTag};
    use crate::types::pr::{ChangedFile, Comment, PrDetail};
    use chrono::TimeZone;
    use proptest::prelude::*;

    /// Serves a fixed sequence of feed pages; other methods are unused by the
    /// orchestrator.
    struct PagedSource {
        pages: Vec<FeedPage>,
    }

    impl PagedSource {
        fn new(pages: Vec<Vec<PrSummary>>) -> Self {
            let last = pages.len().saturating_sub(1);
            let pages = pages
                .into_iter()
                .enumerate()
                .map(|(idx, items)| FeedPage {
                    items,
                    next: (idx < last).then(|| FeedCursor(format!("page-{}", idx + 1))),
                })
                .collect();
            PagedSource { pages }
        }
    }

    #[async_trait::async_trait]
    impl PrSource for PagedSource {
        async fn pr_detail(
            &self,
            _number: PrNumber,
            _tag: Option<&RevisionTag>,
        ) -> Result<Fetched<PrDetail>, FetchError> {
            unimplemented!("not used by the orchestrator")
        }

        async fn issue_comments(
            &self,
            _number: PrNumber,
            _tag: Option<&RevisionTag>,
        ) -> Result<Fetched<Vec<Comment>>, FetchError> {
            unimplemented!("not used by the orchestrator")
        }

        async fn review_comments(
            &self,
            _number: PrNumber,
            _tag: Option<&RevisionTag>,
        ) -> Result<Fetched<Vec<Comment>>, FetchError> {
            unimplemented!("not used by the orchestrator")
        }

        async fn changed_files(
            &self,
            _number: PrNumber,
            _tag: Option<&RevisionTag>,
        ) -> Result<Fetched<Vec<ChangedFile>>, FetchError> {
            unimplemented!("not used by the orchestrator")
        }

        async fn recently_updated_page(
            &self,
            cursor: Option<&FeedCursor>,
        ) -> Result<FeedPage, FetchError> {
            let idx = match cursor {
                None => 0,
                Some(FeedCursor(c)) => c
                    .strip_prefix("page-")
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0),
            };
            Ok(self.pages.get(idx).cloned().unwrap_or(FeedPage {
                items: Vec::new(),
                next: None,
            }))
        }

        async fn newest_pr_number(&self) -> Result<Option<PrNumber>, FetchError> {
            Ok(None)
        }

        async fn delete_comment(&self, _url: &str) -> Result<(), FetchError> {
            Ok(())
        }
    }

    fn summary(number: u64, hours_ago: i64, now: DateTime<Utc>) -> PrSummary {
        PrSummary {
            number: PrNumber(number),
            updated_at: now - chrono::Duration::hours(hours_ago),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 4, 10, 12, 0, 0).unwrap()
    }

    struct Fixture {
        orchestrator: SyncOrchestrator,
        kv: Arc<InMemoryKvStore>,
        queue: Arc<InMemoryQueue>,
    }

    fn fixture(pages: Vec<Vec<PrSummary>>) -> Fixture {
        let kv = Arc::new(InMemoryKvStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let orchestrator = SyncOrchestrator::new(
            Arc::new(PagedSource::new(pages)),
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

    async fn drain(queue: &InMemoryQueue, name: QueueName) -> Vec<RefreshTask> {
        let mut rx = queue.take_receiver(name).await.unwrap();
        let mut tasks = Vec::new();
        while let Ok(task) = rx.try_recv() {
            tasks.push(task);
        }
        tasks
    }

    #[tokio::test]
    async fn first_pass_routes_by_freshness_and_sets_watermark() {
        let now = now();
        // 2h and 200h ago: one fresh (within a day), one stale.
        let f = fixture(vec![vec![summary(10, 2, now), summary(3, 200, now)]]);

        let report = f.orchestrator.run_once(now).await.unwrap();
        assert_eq!(report.fresh, 1);
        assert_eq!(report.stale, 1);

        let fresh = drain(&f.queue, QueueName::FreshPrs).await;
        assert_eq!(fresh, vec![RefreshTask::Pr { number: PrNumber(10) }]);
        let stale = drain(&f.queue, QueueName::OldPrs).await;
        assert_eq!(stale, vec![RefreshTask::Pr { number: PrNumber(3) }]);

        // The watermark is the newest update time observed.
        let stored = f.kv.get(PR_SYNC_WATERMARK).await.unwrap().unwrap();
        assert_eq!(
            stored,
            (now - chrono::Duration::hours(2)).to_rfc3339()
        );
    }

    #[tokio::test]
    async fn walk_stops_at_the_first_item_older_than_the_watermark() {
        let now = now();
        let watermark = now - chrono::Duration::hours(5);
        let f = fixture(vec![
            vec![summary(20, 1, now), summary(19, 3, now)],
            // This whole page is older than the watermark; the walk must not
            // reach its second item.
            vec![summary(18, 6, now), summary(17, 7, now)],
        ]);
        f.kv
            .put(PR_SYNC_WATERMARK, watermark.to_rfc3339())
            .await
            .unwrap();

        let report = f.orchestrator.run_once(now).await.unwrap();
        assert_eq!(report.fresh + report.stale, 2);

        let fresh = drain(&f.queue, QueueName::FreshPrs).await;
        let numbers: Vec<_> = fresh
            .iter()
            .map(|t| match t {
                RefreshTask::Pr { number } => number.0,
                other => panic!("unexpected task {other}"),
            })
            .collect();
        assert_eq!(numbers, vec![20, 19]);
    }

    #[tokio::test]
    async fn item_aged_exactly_the_threshold_routes_stale() {
        let now = now();
        // Default threshold is one day; 24h ago is the boundary.
        let f = fixture(vec![vec![summary(11, 24, now), summary(12, 23, now)]]);

        let report = f.orchestrator.run_once(now).await.unwrap();
        assert_eq!(report.fresh, 1);
        assert_eq!(report.stale, 1);

        let stale = drain(&f.queue, QueueName::OldPrs).await;
        assert_eq!(stale, vec![RefreshTask::Pr { number: PrNumber(11) }]);
    }

    #[tokio::test]
    async fn item_exactly_at_the_watermark_is_reprocessed() {
        let now = now();
        let boundary = now - chrono::Duration::hours(4);
        let f = fixture(vec![vec![PrSummary {
            number: PrNumber(8),
            updated_at: boundary,
        }]]);
        f.kv
            .put(PR_SYNC_WATERMARK, boundary.to_rfc3339())
            .await
            .unwrap();

        let report = f.orchestrator.run_once(now).await.unwrap();
        assert_eq!(report.fresh, 1);
    }

    #[tokio::test]
    async fn empty_feed_leaves_the_watermark_untouched() {
        let now = now();
        let f = fixture(vec![vec![]]);

        let report = f.orchestrator.run_once(now).await.unwrap();
        assert_eq!(report, SyncReport::default());
        assert_eq!(f.kv.get(PR_SYNC_WATERMARK).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_watermark_degrades_to_a_full_walk() {
        let now = now();
        let f = fixture(vec![vec![summary(1, 2, now)]]);
        f.kv
            .put(PR_SYNC_WATERMARK, "not a timestamp".to_string())
            .await
            .unwrap();

        let report = f.orchestrator.run_once(now).await.unwrap();
        assert_eq!(report.fresh, 1);
        // And the pass repaired the stored value.
        let stored = f.kv.get(PR_SYNC_WATERMARK).await.unwrap().unwrap();
        assert!(DateTime::parse_from_rfc3339(&stored).is_ok());
    }

    proptest! {
        #[test]
        fn watermark_never_moves_backwards(
            current in proptest::option::of(0i64..2_000_000_000),
            seen in 0i64..2_000_000_000,
        ) {
            let current = current.map(|s| Utc.timestamp_opt(s, 0).unwrap());
            let seen = Utc.timestamp_opt(seen, 0).unwrap();
            let advanced = advance_watermark(current, seen);
            prop_assert!(advanced >= seen);
            if let Some(current) = current {
                prop_assert!(advanced >= current);
            }
        }
    }
}
