//! Mirrored tracker issues and their display projections.
//!
//! The tracker issue record keeps the raw detail snapshot; everything a
//! reader wants (priority, type, status, target versions, shepherd) is a
//! pure projection over it with defensive defaults for absent fields.

use serde::{Deserialize, Serialize};

use super::ids::IssueKey;

/// A name/icon pair as the tracker renders priorities, types and statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedIcon {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "iconUrl")]
    pub icon_url: Option<String>,
}

/// Status field; the display name comes from the status category when the
/// tracker provides one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "iconUrl")]
    pub icon_url: Option<String>,
    #[serde(default, rename = "statusCategory")]
    pub status_category: Option<StatusCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCategory {
    #[serde(default)]
    pub name: Option<String>,
}

/// A person reference on the tracker side (shepherd/assignee).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerUser {
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// The subset of the tracker's issue document that the pipeline reads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub status: Option<IssueStatus>,
    #[serde(default)]
    pub priority: Option<NamedIcon>,
    #[serde(default)]
    pub issuetype: Option<NamedIcon>,
    #[serde(default, rename = "fixVersions")]
    pub target_versions: Vec<VersionRef>,
    #[serde(default)]
    pub shepherd: Option<TrackerUser>,
}

/// Raw issue detail snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IssueDetail {
    #[serde(default)]
    pub fields: IssueFields,
}

/// A mirrored tracker issue: identity plus raw snapshot.
///
/// Created on first reference, overwritten on each refresh, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirroredIssue {
    pub key: IssueKey,
    pub detail: IssueDetail,
}

impl MirroredIssue {
    pub fn new(key: IssueKey, detail: IssueDetail) -> Self {
        MirroredIssue { key, detail }
    }

    /// Status display name, taken from the status category.
    pub fn status_name(&self) -> Option<&str> {
        self.detail
            .fields
            .status
            .as_ref()?
            .status_category
            .as_ref()?
            .name
            .as_deref()
    }

    pub fn status_icon_url(&self) -> Option<&str> {
        self.detail.fields.status.as_ref()?.icon_url.as_deref()
    }

    pub fn priority_name(&self) -> Option<&str> {
        self.detail.fields.priority.as_ref()?.name.as_deref()
    }

    pub fn priority_icon_url(&self) -> Option<&str> {
        self.detail.fields.priority.as_ref()?.icon_url.as_deref()
    }

    pub fn issuetype_name(&self) -> Option<&str> {
        self.detail.fields.issuetype.as_ref()?.name.as_deref()
    }

    pub fn issuetype_icon_url(&self) -> Option<&str> {
        self.detail.fields.issuetype.as_ref()?.icon_url.as_deref()
    }

    /// Shepherd display name, falling back to the plain account name.
    pub fn shepherd_display_name(&self) -> Option<&str> {
        let shepherd = self.detail.fields.shepherd.as_ref()?;
        shepherd
            .display_name
            .as_deref()
            .or(shepherd.name.as_deref())
    }

    /// Named target versions, in snapshot order.
    pub fn target_versions(&self) -> Vec<&str> {
        self.detail
            .fields
            .target_versions
            .iter()
            .filter_map(|v| v.name.as_deref())
            .collect()
    }
}
