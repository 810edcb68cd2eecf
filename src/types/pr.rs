//! Mirrored pull request records and raw snapshot types.
//!
//! Raw snapshots are the decoded upstream documents, kept verbatim in the
//! record with one revision tag per independently fetched sub-resource
//! (detail, issue comments, review comments, changed files). Derived fields
//! are recomputed from the raw snapshots on every refresh; they are never
//! inputs to future derivation.
//!
//! Every wire field the upstream might omit (deleted accounts, absent diff
//! context) is an `Option` with a defensive default, so a partial upstream
//! document decodes instead of failing the refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommentId, PrNumber, RevisionTag};
use crate::derive::{CiOutcome, Commenter, ParsedTitle};

/// Lifecycle state as reported by the PR source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
}

impl Default for PrState {
    fn default() -> Self {
        PrState::Open
    }
}

/// An upstream user reference.
///
/// Absent entirely when the account was deleted upstream, which is why every
/// comment holds `Option<UserRef>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Raw PR detail snapshot: the subset of the upstream detail document that
/// the pipeline reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrDetail {
    pub number: PrNumber,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub state: Option<PrState>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
    #[serde(default)]
    pub mergeable: Option<bool>,
}

/// A comment from either the issue thread or the diff.
///
/// `diff_hunk` is populated only for diff (review) comments. Edits upstream
/// are detected by re-fetching the whole stream; there is no per-comment
/// revision tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub body: String,
    /// API URL of the comment; the delete endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
}

impl Comment {
    /// The author's login, if the account still exists upstream.
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }
}

/// One entry of the changed-file list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A feed item from the "recently updated" listing. Only the identity and the
/// update time are read; the refresh task re-fetches everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrSummary {
    pub number: PrNumber,
    pub updated_at: DateTime<Utc>,
}

/// Derived, recomputable presentation facts.
///
/// Pure function of the raw snapshots; overwritten wholesale at the end of
/// every refresh so readers never observe stale derived fields next to fresh
/// raw data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedState {
    /// Component labels; never empty once computed (defaults to `["Core"]`).
    pub components: Vec<String>,
    pub parsed_title: ParsedTitle,
    /// Per-author roll-up, latest commenter first.
    pub commenters: Vec<Commenter>,
    pub ci_outcome: CiOutcome,
}

/// A mirrored pull request.
///
/// Created on first reference (by number) with no raw data, populated as
/// refreshes observe changed revision tags, never deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirroredPr {
    pub number: PrNumber,
    pub state: PrState,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    // Raw snapshots, one revision tag each.
    #[serde(default)]
    pub detail: Option<PrDetail>,
    #[serde(default)]
    pub detail_tag: Option<RevisionTag>,
    #[serde(default)]
    pub issue_comments: Vec<Comment>,
    #[serde(default)]
    pub issue_comments_tag: Option<RevisionTag>,
    #[serde(default)]
    pub review_comments: Vec<Comment>,
    #[serde(default)]
    pub review_comments_tag: Option<RevisionTag>,
    #[serde(default)]
    pub changed_files: Vec<ChangedFile>,
    #[serde(default)]
    pub changed_files_tag: Option<RevisionTag>,

    #[serde(default)]
    pub derived: DerivedState,
}

impl MirroredPr {
    /// A record as first referenced: identity only, no raw data.
    pub fn new(number: PrNumber) -> Self {
        MirroredPr {
            number,
            state: PrState::Open,
            author: None,
            updated_at: None,
            detail: None,
            detail_tag: None,
            issue_comments: Vec::new(),
            issue_comments_tag: None,
            review_comments: Vec::new(),
            review_comments_tag: None,
            changed_files: Vec::new(),
            changed_files_tag: None,
            derived: DerivedState::default(),
        }
    }

    /// The title used for classification and parsing: the detail snapshot's
    /// title, falling back to the previously parsed title when detail is
    /// absent.
    pub fn effective_title(&self) -> Option<String> {
        self.detail
            .as_ref()
            .and_then(|d| d.title.clone())
            .or_else(|| {
                let cached = &self.derived.parsed_title.title;
                if cached.is_empty() {
                    None
                } else {
                    Some(cached.clone())
                }
            })
    }
}
