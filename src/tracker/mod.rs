//! Tracker (issue system) API and the cross-reference linker.

pub mod client;
pub mod link;

pub use client::TrackerClient;
pub use link::{CrossReferenceLinker, LinkOutcome};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ids::IssueKey;
use crate::types::issue::IssueDetail;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker issue not found: {key}")]
    NotFound { key: IssueKey },

    #[error("unexpected status {status} from tracker at {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode tracker response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An existing back-link on a tracker issue. Only the target URL is read;
/// it is what makes re-linking idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLink {
    pub object: RemoteLinkObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLinkObject {
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
}

/// A back-link to create: title, URL and icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRemoteLink {
    pub title: String,
    pub url: String,
    pub icon: LinkIcon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkIcon {
    pub title: String,
    pub url16x16: String,
}

/// An available workflow transition on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
}

/// One entry of the tracker's recent-activity feed: an issue and when it was
/// last touched. The feed is served newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub key: IssueKey,
    pub updated_at: DateTime<Utc>,
}

/// The tracker API as the pipeline consumes it.
#[async_trait]
pub trait TrackerApi: Send + Sync {
    async fn issue(&self, key: &IssueKey) -> Result<IssueDetail, TrackerError>;

    /// The most recently touched issues of `project`, newest first, at most
    /// `max_results` entries.
    async fn recent_activity(
        &self,
        project: &str,
        max_results: u32,
    ) -> Result<Vec<ActivityEntry>, TrackerError>;

    async fn remote_links(&self, key: &IssueKey) -> Result<Vec<RemoteLink>, TrackerError>;

    async fn add_remote_link(
        &self,
        key: &IssueKey,
        link: &NewRemoteLink,
    ) -> Result<(), TrackerError>;

    async fn add_comment(&self, key: &IssueKey, body: &str) -> Result<(), TrackerError>;

    async fn transitions(&self, key: &IssueKey) -> Result<Vec<Transition>, TrackerError>;

    async fn apply_transition(
        &self,
        key: &IssueKey,
        transition_id: &str,
    ) -> Result<(), TrackerError>;

    async fn assign(&self, key: &IssueKey, user: &str) -> Result<(), TrackerError>;
}
