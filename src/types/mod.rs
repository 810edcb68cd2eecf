//! Core domain types for the mirror.

pub mod ids;
pub mod issue;
pub mod pr;

pub use ids::{CommentId, IssueKey, PrNumber, RevisionTag};
pub use issue::{IssueDetail, IssueFields, MirroredIssue};
pub use pr::{ChangedFile, Comment, DerivedState, MirroredPr, PrDetail, PrState, PrSummary, UserRef};
