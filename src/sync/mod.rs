//! Sync orchestration: the scheduled watermark walk over the
//! recently-updated feed, and the on-demand full backfill.
//!
//! Orchestrators only discover identities and enqueue refresh tasks; all
//! fetching of record bodies happens in the workers. Losing a task to a
//! crash is recovered by the next pass, because the watermark only advances
//! after a fully successful walk.

pub mod backfill;
pub mod issues;
pub mod orchestrator;

pub use backfill::BackfillOrchestrator;
pub use issues::{IssueSyncOrchestrator, IssueSyncReport};
pub use orchestrator::{SyncOrchestrator, SyncReport};

use thiserror::Error;

use crate::github::FetchError;
use crate::queue::QueueError;
use crate::store::StoreError;
use crate::tracker::TrackerError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("backfill batch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
