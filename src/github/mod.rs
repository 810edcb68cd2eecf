//! PR source API: conditional fetching, pagination, and the trait seam the
//! workers and orchestrators run against.

pub mod client;
pub mod error;

pub use client::GithubClient;
pub use error::FetchError;

use async_trait::async_trait;

use crate::types::ids::{PrNumber, RevisionTag};
use crate::types::pr::{ChangedFile, Comment, PrDetail, PrSummary};

/// Result of a conditional fetch.
///
/// `Unchanged` means the replayed revision tag still matched and the
/// resource carried no body; callers treat it as a silent no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Unchanged,
    Fresh { value: T, revision: RevisionTag },
}

impl<T> Fetched<T> {
    /// Splits the fetch into its parts, `None` when unchanged.
    pub fn into_parts(self) -> Option<(T, RevisionTag)> {
        match self {
            Fetched::Unchanged => None,
            Fetched::Fresh { value, revision } => Some((value, revision)),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Fetched::Unchanged)
    }
}

/// Opaque position in the recently-updated feed (the "next" relation of the
/// previous page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCursor(pub String);

/// One page of the recently-updated feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub items: Vec<PrSummary>,
    pub next: Option<FeedCursor>,
}

/// The PR source API as the pipeline consumes it.
///
/// Detail, comment-stream and changed-file fetches are each independently
/// conditional: the caller replays the revision tag it stored for that
/// sub-resource and gets `Unchanged` when nothing moved.
#[async_trait]
pub trait PrSource: Send + Sync {
    async fn pr_detail(
        &self,
        number: PrNumber,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<PrDetail>, FetchError>;

    async fn issue_comments(
        &self,
        number: PrNumber,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<Vec<Comment>>, FetchError>;

    async fn review_comments(
        &self,
        number: PrNumber,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<Vec<Comment>>, FetchError>;

    async fn changed_files(
        &self,
        number: PrNumber,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<Vec<ChangedFile>>, FetchError>;

    /// One page of the "all items sorted by update time, descending" feed.
    /// `None` starts from the head; the returned cursor continues the walk.
    async fn recently_updated_page(
        &self,
        cursor: Option<&FeedCursor>,
    ) -> Result<FeedPage, FetchError>;

    /// The highest PR number known upstream, via a single "created
    /// descending" query. `None` for an empty repository.
    async fn newest_pr_number(&self) -> Result<Option<PrNumber>, FetchError>;

    /// Deletes a comment by its API URL. Deleting an already-deleted comment
    /// succeeds, so GC retries stay idempotent.
    async fn delete_comment(&self, url: &str) -> Result<(), FetchError>;
}
