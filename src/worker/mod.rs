//! Refresh workers: the per-record units of work the queues fan out to.

pub mod gc;
pub mod issue;
pub mod refresh;

pub use issue::IssueRefreshWorker;
pub use refresh::{PrRefreshWorker, RefreshOutcome};

use thiserror::Error;

use crate::github::FetchError;
use crate::store::StoreError;
use crate::tracker::TrackerError;

/// A refresh task failure. Fatal for the task; the at-least-once dispatch
/// layer redelivers it. Cross-reference linking failures are *not* here:
/// they are caught and logged per tracker key inside the refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
