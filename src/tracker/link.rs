//! Cross-reference linking: back-links from tracker issues to PRs.
//!
//! The link and the announcement comment are two independent API writes with
//! no shared transaction. A crash between them leaves a back-link without
//! its comment; a retry sees the existing back-link and skips both writes,
//! so the comment is never re-posted. That window is accepted behavior, not
//! corrected here.

use std::sync::Arc;

use super::{LinkIcon, NewRemoteLink, TrackerApi, TrackerError};
use crate::types::ids::{IssueKey, PrNumber};

const LINK_ICON_URL: &str = "https://assets-cdn.github.com/favicon.ico";

/// What `link` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The back-link already existed; nothing was written.
    AlreadyLinked,
    /// Back-link and comment were created.
    Linked,
}

/// Idempotently links tracker issues to the PRs that reference them.
#[derive(Clone)]
pub struct CrossReferenceLinker {
    tracker: Arc<dyn TrackerApi>,
    /// Workflow transition applied after a first-time link, by name.
    transition: Option<String>,
}

impl CrossReferenceLinker {
    pub fn new(tracker: Arc<dyn TrackerApi>, transition: Option<String>) -> Self {
        CrossReferenceLinker {
            tracker,
            transition,
        }
    }

    /// Creates a back-link and comment on `key` pointing at the PR, unless
    /// the back-link already exists.
    pub async fn link(
        &self,
        key: &IssueKey,
        pr_number: PrNumber,
        pr_url: &str,
        pr_author: &str,
    ) -> Result<LinkOutcome, TrackerError> {
        let existing = self.tracker.remote_links(key).await?;
        if existing.iter().any(|link| link.object.url == pr_url) {
            return Ok(LinkOutcome::AlreadyLinked);
        }

        let link = NewRemoteLink {
            title: format!("[Github] Pull Request {pr_number} ({pr_author})"),
            url: pr_url.to_string(),
            icon: LinkIcon {
                title: format!("Pull request {pr_number}"),
                url16x16: LINK_ICON_URL.to_string(),
            },
        };
        self.tracker.add_remote_link(key, &link).await?;

        let comment = format!(
            "User '{pr_author}' has created a pull request for this issue:\n{pr_url}"
        );
        self.tracker.add_comment(key, &comment).await?;
        tracing::info!(%key, %pr_number, "linked PR to tracker issue");

        if let Some(name) = &self.transition {
            self.apply_named_transition(key, name).await?;
        }
        Ok(LinkOutcome::Linked)
    }

    /// Advances the issue's workflow by transition name. An unavailable
    /// transition (already in the target state, or not permitted) is a
    /// logged no-op.
    async fn apply_named_transition(
        &self,
        key: &IssueKey,
        name: &str,
    ) -> Result<(), TrackerError> {
        let transitions = self.tracker.transitions(key).await?;
        match transitions
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            Some(transition) => self.tracker.apply_transition(key, &transition.id).await,
            None => {
                tracing::debug!(%key, transition = name, "transition not available; skipping");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{RemoteLink, RemoteLinkObject, Transition};
    use crate::types::issue::IssueDetail;
    use std::sync::Mutex;

    /// Call-recording tracker double.
    #[derive(Default)]
    struct FakeTracker {
        links: Mutex<Vec<RemoteLink>>,
        comments: Mutex<Vec<String>>,
        transitions: Vec<Transition>,
        applied_transitions: Mutex<Vec<String>>,
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

        async fn remote_links(&self, _key: &IssueKey) -> Result<Vec<RemoteLink>, TrackerError> {
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

        async fn add_comment(&self, _key: &IssueKey, body: &str) -> Result<(), TrackerError> {
            self.comments.lock().unwrap().push(body.to_string());
            Ok(())
        }

        async fn transitions(&self, _key: &IssueKey) -> Result<Vec<Transition>, TrackerError> {
            Ok(self.transitions.clone())
        }

        async fn apply_transition(
            &self,
            _key: &IssueKey,
            transition_id: &str,
        ) -> Result<(), TrackerError> {
            self.applied_transitions
                .lock()
                .unwrap()
                .push(transition_id.to_string());
            Ok(())
        }

        async fn assign(&self, _key: &IssueKey, _user: &str) -> Result<(), TrackerError> {
            Ok(())
        }
    }

    const PR_URL: &str = "https://github.com/apache/spark/pull/42";

    #[tokio::test]
    async fn first_link_creates_link_and_comment() {
        let tracker = Arc::new(FakeTracker::default());
        let linker = CrossReferenceLinker::new(tracker.clone(), None);

        let outcome = linker
            .link(&IssueKey::new("SPARK-1"), PrNumber(42), PR_URL, "alice")
            .await
            .unwrap();

        assert_eq!(outcome, LinkOutcome::Linked);
        assert_eq!(tracker.links.lock().unwrap().len(), 1);
        let comments = tracker.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("alice"));
        assert!(comments[0].contains(PR_URL));
    }

    #[tokio::test]
    async fn relinking_is_a_no_op() {
        let tracker = Arc::new(FakeTracker::default());
        let linker = CrossReferenceLinker::new(tracker.clone(), None);
        let key = IssueKey::new("SPARK-1");

        linker.link(&key, PrNumber(42), PR_URL, "alice").await.unwrap();
        let outcome = linker.link(&key, PrNumber(42), PR_URL, "alice").await.unwrap();

        assert_eq!(outcome, LinkOutcome::AlreadyLinked);
        assert_eq!(tracker.links.lock().unwrap().len(), 1);
        assert_eq!(tracker.comments.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn configured_transition_is_applied_when_available() {
        let tracker = Arc::new(FakeTracker {
            transitions: vec![Transition {
                id: "21".to_string(),
                name: "Start Progress".to_string(),
            }],
            ..FakeTracker::default()
        });
        let linker =
            CrossReferenceLinker::new(tracker.clone(), Some("start progress".to_string()));

        linker
            .link(&IssueKey::new("SPARK-2"), PrNumber(7), PR_URL, "bob")
            .await
            .unwrap();

        assert_eq!(*tracker.applied_transitions.lock().unwrap(), vec!["21"]);
    }

    #[tokio::test]
    async fn missing_transition_is_skipped() {
        let tracker = Arc::new(FakeTracker::default());
        let linker = CrossReferenceLinker::new(tracker.clone(), Some("Start Progress".to_string()));

        let outcome = linker
            .link(&IssueKey::new("SPARK-3"), PrNumber(7), PR_URL, "bob")
            .await
            .unwrap();

        assert_eq!(outcome, LinkOutcome::Linked);
        assert!(tracker.applied_transitions.lock().unwrap().is_empty());
    }
}
