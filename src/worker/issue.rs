//! The tracker-issue refresh worker.
//!
//! Much simpler than the PR side: the tracker offers no conditional fetch,
//! so a refresh is an unconditional snapshot overwrite.

use std::sync::Arc;

use tracing::debug;

use super::RefreshError;
use crate::store::MirrorStore;
use crate::tracker::TrackerApi;
use crate::types::ids::IssueKey;
use crate::types::issue::MirroredIssue;

pub struct IssueRefreshWorker {
    tracker: Arc<dyn TrackerApi>,
    store: Arc<dyn MirrorStore>,
}

impl IssueRefreshWorker {
    pub fn new(tracker: Arc<dyn TrackerApi>, store: Arc<dyn MirrorStore>) -> Self {
        IssueRefreshWorker { tracker, store }
    }

    /// Fetches the issue and overwrites the mirrored record.
    pub async fn refresh_issue(&self, key: &IssueKey) -> Result<(), RefreshError> {
        let detail = self.tracker.issue(key).await?;
        self.store
            .put_issue(MirroredIssue::new(key.clone(), detail))
            .await?;
        debug!(%key, "refreshed tracker issue");
        Ok(())
    }
}
