//! Persistence contracts: the watermark key/value store and the
//! mirrored-record store.
//!
//! Both are external collaborators from the pipeline's point of view, so
//! they are traits; the in-memory implementations back the daemon binary and
//! the tests. Writes are overwrite-only, and readers tolerate `None` on a
//! fresh install by supplying defaults.

pub mod mem;

pub use mem::{InMemoryKvStore, InMemoryMirrorStore};

use async_trait::async_trait;
use thiserror::Error;

use crate::types::ids::{IssueKey, PrNumber};
use crate::types::issue::MirroredIssue;
use crate::types::pr::MirroredPr;

/// Watermark key for the PR sync orchestrator.
pub const PR_SYNC_WATERMARK: &str = "pr_sync_watermark";

/// Watermark key for the tracker-issue sync orchestrator.
pub const ISSUE_SYNC_WATERMARK: &str = "issue_sync_watermark";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Tiny key/value persistence for sync checkpoints and small scalars.
///
/// Values are stored in their human-readable string form (RFC 3339 for
/// timestamps), which doubles as the display form.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrites any previous value; there is no merge.
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// Upsert-by-identity record store for mirrored PRs and tracker issues.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn get_pr(&self, number: PrNumber) -> Result<Option<MirroredPr>, StoreError>;

    async fn put_pr(&self, pr: MirroredPr) -> Result<(), StoreError>;

    /// Open PRs ordered by last update, newest first.
    async fn open_prs_by_update_desc(&self) -> Result<Vec<MirroredPr>, StoreError>;

    async fn get_issue(&self, key: &IssueKey) -> Result<Option<MirroredIssue>, StoreError>;

    async fn put_issue(&self, issue: MirroredIssue) -> Result<(), StoreError>;
}
