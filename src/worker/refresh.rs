//! The PR refresh worker.
//!
//! One refresh brings a single mirrored PR fully up to date: conditionally
//! re-fetch the detail document and each comment/file stream, recompute
//! every derived field from the raw snapshots now on the record, link
//! referenced tracker issues, garbage-collect stale bot comments, and
//! persist the merged record.
//!
//! Refreshes are idempotent and safe to run concurrently for the same PR:
//! raw snapshots and derived fields are always written together, so a last
//! write leaves the record self-consistent.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{gc, RefreshError};
use crate::config::MirrorConfig;
use crate::derive::DeriveContext;
use crate::github::PrSource;
use crate::store::MirrorStore;
use crate::tracker::CrossReferenceLinker;
use crate::types::ids::{IssueKey, PrNumber};
use crate::types::pr::MirroredPr;

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The detail revision tag still matched; nothing was touched.
    Unchanged,
    /// The number does not exist upstream (backfills probe the whole dense
    /// number range, so this is routine).
    Missing,
    Updated,
}

pub struct PrRefreshWorker {
    source: Arc<dyn PrSource>,
    store: Arc<dyn MirrorStore>,
    linker: CrossReferenceLinker,
    derive: DeriveContext,
    primary_ci_bot: String,
    secondary_ci_bot: String,
    tracker_project: String,
}

impl PrRefreshWorker {
    pub fn new(
        source: Arc<dyn PrSource>,
        store: Arc<dyn MirrorStore>,
        linker: CrossReferenceLinker,
        config: &MirrorConfig,
    ) -> Result<Self, regex::Error> {
        Ok(PrRefreshWorker {
            source,
            store,
            linker,
            derive: DeriveContext::new(config)?,
            primary_ci_bot: config.primary_ci_bot.clone(),
            secondary_ci_bot: config.secondary_ci_bot.clone(),
            tracker_project: config.tracker_project.clone(),
        })
    }

    /// Refreshes one PR. Returns `Unchanged` without side effects when the
    /// detail document hasn't moved since the stored revision tag.
    pub async fn refresh_pr(&self, number: PrNumber) -> Result<RefreshOutcome, RefreshError> {
        let mut pr = self
            .store
            .get_pr(number)
            .await?
            .unwrap_or_else(|| MirroredPr::new(number));

        let fetched = match self.source.pr_detail(number, pr.detail_tag.as_ref()).await {
            Ok(fetched) => fetched,
            Err(error) if error.is_not_found() => {
                debug!(pr = %number, "no such PR upstream; skipping");
                return Ok(RefreshOutcome::Missing);
            }
            Err(error) => return Err(error.into()),
        };
        let Some((detail, tag)) = fetched.into_parts() else {
            debug!(pr = %number, "detail unchanged since last visit; skipping");
            return Ok(RefreshOutcome::Unchanged);
        };

        pr.state = detail.state.unwrap_or(pr.state);
        pr.author = detail.user.as_ref().map(|u| u.login.clone()).or(pr.author);
        pr.updated_at = detail.updated_at.or(pr.updated_at);
        pr.detail = Some(detail);
        pr.detail_tag = Some(tag);

        // The comment streams and the file list are each independently
        // conditional; a partial update (detail moved, comments didn't) is
        // expected and correct.
        if let Some((comments, tag)) = self
            .source
            .issue_comments(number, pr.issue_comments_tag.as_ref())
            .await?
            .into_parts()
        {
            pr.issue_comments = comments;
            pr.issue_comments_tag = Some(tag);
        }
        if let Some((comments, tag)) = self
            .source
            .review_comments(number, pr.review_comments_tag.as_ref())
            .await?
            .into_parts()
        {
            pr.review_comments = comments;
            pr.review_comments_tag = Some(tag);
        }
        if let Some((files, tag)) = self
            .source
            .changed_files(number, pr.changed_files_tag.as_ref())
            .await?
            .into_parts()
        {
            pr.changed_files = files;
            pr.changed_files_tag = Some(tag);
        }

        // Full recomputation from all currently-held raw data, even when
        // only one sub-resource changed.
        pr.derived = self.derive.compute(&pr);

        self.link_referenced_issues(&pr).await;

        gc::collect_stale_comments(
            &*self.source,
            &pr.issue_comments,
            &pr.derived.ci_outcome,
            &self.primary_ci_bot,
            &self.secondary_ci_bot,
        )
        .await;

        self.store.put_pr(pr).await?;
        Ok(RefreshOutcome::Updated)
    }

    /// Links every tracker issue referenced in the title. A failure for one
    /// key is logged and does not abort the others or the refresh.
    async fn link_referenced_issues(&self, pr: &MirroredPr) {
        let Some(pr_url) = pr.detail.as_ref().and_then(|d| d.html_url.as_deref()) else {
            return;
        };
        let author = pr.author.as_deref().unwrap_or("unknown");
        for id in &pr.derived.parsed_title.tracker_ids {
            let key = IssueKey::from_parts(&self.tracker_project, *id);
            if let Err(error) = self.linker.link(&key, pr.number, pr_url, author).await {
                warn!(%key, pr = %pr.number, %error, "failed to link tracker issue");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{Fetched, FeedCursor, FeedPage, FetchError};
    use crate::store::InMemoryMirrorStore;
    use crate::tracker::{
        NewRemoteLink, RemoteLink, RemoteLinkObject, TrackerApi, TrackerError, Transition,
    };
    use crate::types::ids::{CommentId, RevisionTag};
    use crate::types::issue::IssueDetail;
    use crate::types::pr::{ChangedFile, Comment, PrDetail, PrState, UserRef};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted PR source: serves fixed snapshots, answers `Unchanged` when
    /// the replayed tag matches, and counts delete calls.
    #[derive(Default)]
    struct FakeSource {
        detail: Option<(PrDetail, RevisionTag)>,
        issue_comments: Option<(Vec<Comment>, RevisionTag)>,
        review_comments: Option<(Vec<Comment>, RevisionTag)>,
        changed_files: Option<(Vec<ChangedFile>, RevisionTag)>,
        detail_missing: bool,
        deletes: Mutex<Vec<String>>,
    }

    fn serve<T: Clone>(
        stored: &Option<(T, RevisionTag)>,
        tag: Option<&RevisionTag>,
        empty: T,
    ) -> Fetched<T> {
        match stored {
            Some((value, revision)) => {
                if tag == Some(revision) {
                    Fetched::Unchanged
                } else {
                    Fetched::Fresh {
                        value: value.clone(),
                        revision: revision.clone(),
                    }
                }
            }
            None => Fetched::Fresh {
                value: empty,
                revision: RevisionTag::new("empty"),
            },
        }
    }

    #[async_trait::async_trait]
    impl PrSource for FakeSource {
        async fn pr_detail(
            &self,
            _number: PrNumber,
            tag: Option<&RevisionTag>,
        ) -> Result<Fetched<PrDetail>, FetchError> {
            if self.detail_missing {
                return Err(FetchError::NotFound {
                    url: "http://api/pulls/42".to_string(),
                });
            }
            let (detail, revision) = self.detail.clone().expect("test configures detail");
            if tag == Some(&revision) {
                Ok(Fetched::Unchanged)
            } else {
                Ok(Fetched::Fresh {
                    value: detail,
                    revision,
                })
            }
        }

        async fn issue_comments(
            &self,
            _number: PrNumber,
            tag: Option<&RevisionTag>,
        ) -> Result<Fetched<Vec<Comment>>, FetchError> {
            Ok(serve(&self.issue_comments, tag, Vec::new()))
        }

        async fn review_comments(
            &self,
            _number: PrNumber,
            tag: Option<&RevisionTag>,
        ) -> Result<Fetched<Vec<Comment>>, FetchError> {
            Ok(serve(&self.review_comments, tag, Vec::new()))
        }

        async fn changed_files(
            &self,
            _number: PrNumber,
            tag: Option<&RevisionTag>,
        ) -> Result<Fetched<Vec<ChangedFile>>, FetchError> {
            Ok(serve(&self.changed_files, tag, Vec::new()))
        }

        async fn recently_updated_page(
            &self,
            _cursor: Option<&FeedCursor>,
        ) -> Result<FeedPage, FetchError> {
            Ok(FeedPage {
                items: Vec::new(),
                next: None,
            })
        }

        async fn newest_pr_number(&self) -> Result<Option<PrNumber>, FetchError> {
            Ok(None)
        }

        async fn delete_comment(&self, url: &str) -> Result<(), FetchError> {
            self.deletes.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    /// Tracker double counting link-related calls; optionally failing.
    #[derive(Default)]
    struct FakeTracker {
        links: Mutex<Vec<RemoteLink>>,
        comments: AtomicUsize,
        fail_all: bool,
    }

    #[async_trait::async_trait]
    impl TrackerApi for FakeTracker {
        async fn issue(&self, _key: &IssueKey) -> Result<IssueDetail, TrackerError> {
            Ok(IssueDetail::default())
        }

        async fn recent_activity(
            &self,
            _project: &str,
            _max_results: u32,
        ) -> Result<Vec<crate::tracker::ActivityEntry>, TrackerError> {
            Ok(Vec::new())
        }

        async fn remote_links(&self, key: &IssueKey) -> Result<Vec<RemoteLink>, TrackerError> {
            if self.fail_all {
                return Err(TrackerError::NotFound { key: key.clone() });
            }
            Ok(self.links.lock().unwrap().clone())
        }

        async fn add_remote_link(
            &self,
            _key: &IssueKey,
            link: &NewRemoteLink,
        ) -> Result<(), TrackerError> {
            self.links.lock().unwrap().push(RemoteLink {
                object: RemoteLinkObject {
                    title: Some(link.title.clone()),
                    url: link.url.clone(),
                },
            });
            Ok(())
        }

        async fn add_comment(&self, _key: &IssueKey, _body: &str) -> Result<(), TrackerError> {
            self.comments.fetch_add(1, Ordering::SeqCst);
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

    fn detail(title: &str) -> PrDetail {
        PrDetail {
            number: PrNumber(42),
            title: Some(title.to_string()),
            state: Some(PrState::Open),
            user: Some(UserRef {
                login: "alice".to_string(),
                avatar_url: None,
            }),
            html_url: Some("https://github.com/apache/spark/pull/42".to_string()),
            updated_at: Some(Utc.with_ymd_and_hms(2014, 4, 1, 12, 0, 0).unwrap()),
            additions: Some(10),
            deletions: Some(2),
            mergeable: Some(true),
        }
    }

    fn bot_comment(id: u64, author: &str, body: &str) -> Comment {
        Comment {
            id: CommentId(id),
            user: Some(UserRef {
                login: author.to_string(),
                avatar_url: None,
            }),
            body: body.to_string(),
            url: Some(format!("http://api/comments/{id}")),
            html_url: None,
            created_at: Utc.with_ymd_and_hms(2014, 4, 1, 0, id as u32, 0).unwrap(),
            updated_at: None,
            diff_hunk: None,
        }
    }

    struct Harness {
        worker: PrRefreshWorker,
        source: Arc<FakeSource>,
        tracker: Arc<FakeTracker>,
        store: Arc<InMemoryMirrorStore>,
    }

    fn harness(source: FakeSource, tracker: FakeTracker) -> Harness {
        let source = Arc::new(source);
        let tracker = Arc::new(tracker);
        let store = Arc::new(InMemoryMirrorStore::new());
        let config = MirrorConfig::new();
        let linker = CrossReferenceLinker::new(tracker.clone(), None);
        let worker = PrRefreshWorker::new(source.clone(), store.clone(), linker, &config).unwrap();
        Harness {
            worker,
            source,
            tracker,
            store,
        }
    }

    #[tokio::test]
    async fn fresh_record_is_populated_and_derived() {
        let h = harness(
            FakeSource {
                detail: Some((detail("[SPARK-975] [SQL] add join hints"), RevisionTag::new("d1"))),
                issue_comments: Some((
                    vec![bot_comment(1, "SparkQA", "Test build #1 has finished: passed")],
                    RevisionTag::new("c1"),
                )),
                ..FakeSource::default()
            },
            FakeTracker::default(),
        );

        let outcome = h.worker.refresh_pr(PrNumber(42)).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated);

        let pr = h.store.get_pr(PrNumber(42)).await.unwrap().unwrap();
        assert_eq!(pr.author.as_deref(), Some("alice"));
        assert_eq!(pr.state, PrState::Open);
        assert_eq!(pr.derived.parsed_title.tracker_ids, vec![975]);
        assert_eq!(pr.derived.components, vec!["SQL"]);
        assert_eq!(pr.derived.ci_outcome.status, crate::derive::CiStatus::Pass);

        // The SPARK-975 reference got linked.
        assert_eq!(h.tracker.links.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unchanged_detail_short_circuits_with_no_side_effects() {
        let h = harness(
            FakeSource {
                detail: Some((detail("[SPARK-975] add join hints"), RevisionTag::new("d1"))),
                issue_comments: Some((
                    vec![
                        bot_comment(1, "SparkQA", "Test build #3 has started"),
                        bot_comment(2, "SparkQA", "Test build #3 has finished: passed"),
                    ],
                    RevisionTag::new("c1"),
                )),
                ..FakeSource::default()
            },
            FakeTracker::default(),
        );

        h.worker.refresh_pr(PrNumber(42)).await.unwrap();
        let first = h.store.get_pr(PrNumber(42)).await.unwrap().unwrap();
        let links_after_first = h.tracker.links.lock().unwrap().len();
        let deletes_after_first = h.source.deletes.lock().unwrap().len();

        // Second run: every revision tag matches, so the refresh is a no-op.
        let outcome = h.worker.refresh_pr(PrNumber(42)).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Unchanged);

        let second = h.store.get_pr(PrNumber(42)).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(h.tracker.links.lock().unwrap().len(), links_after_first);
        assert_eq!(h.source.deletes.lock().unwrap().len(), deletes_after_first);
    }

    #[tokio::test]
    async fn partial_update_keeps_unchanged_snapshots() {
        let comments = vec![bot_comment(1, "alice", "nice work")];
        let store = Arc::new(InMemoryMirrorStore::new());
        let config = MirrorConfig::new();

        let worker_for = |source: FakeSource| {
            let tracker: Arc<FakeTracker> = Arc::new(FakeTracker::default());
            let linker = CrossReferenceLinker::new(tracker, None);
            PrRefreshWorker::new(Arc::new(source), store.clone(), linker, &config).unwrap()
        };

        // First pass stores the detail under d1 and the comments under c1.
        worker_for(FakeSource {
            detail: Some((detail("v1 title"), RevisionTag::new("d1"))),
            issue_comments: Some((comments.clone(), RevisionTag::new("c1"))),
            ..FakeSource::default()
        })
        .refresh_pr(PrNumber(42))
        .await
        .unwrap();

        // Upstream then edits only the detail: its tag moves to d2 while the
        // comment stream still answers c1. The comment snapshot must survive
        // untouched while the detail is replaced.
        let outcome = worker_for(FakeSource {
            detail: Some((detail("v2 title"), RevisionTag::new("d2"))),
            issue_comments: Some((comments, RevisionTag::new("c1"))),
            ..FakeSource::default()
        })
        .refresh_pr(PrNumber(42))
        .await
        .unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated);

        let pr = store.get_pr(PrNumber(42)).await.unwrap().unwrap();
        assert_eq!(pr.detail_tag, Some(RevisionTag::new("d2")));
        assert_eq!(
            pr.detail.as_ref().and_then(|d| d.title.as_deref()),
            Some("v2 title")
        );
        assert_eq!(pr.issue_comments_tag, Some(RevisionTag::new("c1")));
        assert_eq!(pr.issue_comments.len(), 1);
        // Derived state was recomputed from the new title.
        assert_eq!(pr.derived.parsed_title.title, "v2 title");
    }

    #[tokio::test]
    async fn linker_failure_does_not_abort_the_refresh() {
        let h = harness(
            FakeSource {
                detail: Some((
                    detail("[SPARK-1] [SPARK-2] fix both"),
                    RevisionTag::new("d1"),
                )),
                ..FakeSource::default()
            },
            FakeTracker {
                fail_all: true,
                ..FakeTracker::default()
            },
        );

        let outcome = h.worker.refresh_pr(PrNumber(42)).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated);
        assert!(h.store.get_pr(PrNumber(42)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_pr_is_a_clean_skip() {
        let h = harness(
            FakeSource {
                detail_missing: true,
                ..FakeSource::default()
            },
            FakeTracker::default(),
        );

        let outcome = h.worker.refresh_pr(PrNumber(42)).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Missing);
        assert!(h.store.get_pr(PrNumber(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_bot_comments_are_deleted() {
        let h = harness(
            FakeSource {
                detail: Some((detail("no tracker key"), RevisionTag::new("d1"))),
                issue_comments: Some((
                    vec![
                        bot_comment(1, "SparkQA", "Test build #7 has started"),
                        bot_comment(2, "AmplabJenkins", "Build failed"),
                        bot_comment(3, "SparkQA", "Test build #7 has finished: failure"),
                    ],
                    RevisionTag::new("c1"),
                )),
                ..FakeSource::default()
            },
            FakeTracker::default(),
        );

        h.worker.refresh_pr(PrNumber(42)).await.unwrap();

        let deletes = h.source.deletes.lock().unwrap();
        assert_eq!(
            *deletes,
            vec![
                "http://api/comments/2".to_string(),
                "http://api/comments/1".to_string(),
            ]
        );
    }
}
