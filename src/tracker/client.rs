//! Reqwest-backed tracker client (JIRA-style REST API).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{ActivityEntry, NewRemoteLink, RemoteLink, TrackerApi, TrackerError, Transition};
use crate::types::ids::IssueKey;
use crate::types::issue::IssueDetail;

const USER_AGENT: &str = "pr-mirror";

/// Client for one tracker instance, authenticated with basic credentials.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    http: reqwest::Client,
    api_base: String,
    username: String,
    password: String,
}

impl TrackerClient {
    /// `api_base` is the tracker root, e.g. `https://issues.example.org/jira`.
    pub fn new(
        api_base: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        TrackerClient {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        }
    }

    fn issue_url(&self, key: &IssueKey, path: &str) -> String {
        format!("{}/rest/api/latest/issue/{}{}", self.api_base, key, path)
    }

    async fn check(
        key: &IssueKey,
        url: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TrackerError> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(TrackerError::NotFound { key: key.clone() }),
            status if status.is_success() => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(TrackerError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body,
                })
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        key: &IssueKey,
        url: &str,
    ) -> Result<T, TrackerError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", USER_AGENT)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let response = Self::check(key, url, response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| TrackerError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn send_json(
        &self,
        key: &IssueKey,
        method: reqwest::Method,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<(), TrackerError> {
        let response = self
            .http
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;
        Self::check(key, url, response).await?;
        Ok(())
    }
}

/// Timestamp format the tracker uses in search results
/// (`2014-04-01T12:00:00.000+0000`; not quite RFC 3339).
fn parse_tracker_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .or_else(|_| chrono::DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|t| t.with_timezone(&chrono::Utc))
}

#[async_trait]
impl TrackerApi for TrackerClient {
    async fn issue(&self, key: &IssueKey) -> Result<IssueDetail, TrackerError> {
        let url = self.issue_url(key, "");
        self.get_json(key, &url).await
    }

    async fn recent_activity(
        &self,
        project: &str,
        max_results: u32,
    ) -> Result<Vec<ActivityEntry>, TrackerError> {
        #[derive(serde::Deserialize)]
        struct SearchResult {
            #[serde(default)]
            issues: Vec<SearchIssue>,
        }
        #[derive(serde::Deserialize)]
        struct SearchIssue {
            key: String,
            #[serde(default)]
            fields: SearchFields,
        }
        #[derive(Default, serde::Deserialize)]
        struct SearchFields {
            #[serde(default)]
            updated: Option<String>,
        }

        let jql = format!("project = {project} ORDER BY updated DESC");
        let url = format!("{}/rest/api/latest/search", self.api_base);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("jql", jql.as_str()),
                ("fields", "updated"),
                ("maxResults", &max_results.to_string()),
            ])
            .header("User-Agent", USER_AGENT)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        // The search endpoint is not issue-scoped; the 404 mapping gets a
        // synthetic project-wide key.
        let response = Self::check(&IssueKey::new(project), &url, response).await?;
        let body = response.text().await?;
        let result: SearchResult =
            serde_json::from_str(&body).map_err(|source| TrackerError::Decode {
                url: url.clone(),
                source,
            })?;

        Ok(result
            .issues
            .into_iter()
            .filter_map(|issue| {
                let raw = issue.fields.updated?;
                let Some(updated_at) = parse_tracker_timestamp(&raw) else {
                    tracing::warn!(key = %issue.key, %raw, "unparseable update time; skipping entry");
                    return None;
                };
                Some(ActivityEntry {
                    key: IssueKey::new(issue.key),
                    updated_at,
                })
            })
            .collect())
    }

    async fn remote_links(&self, key: &IssueKey) -> Result<Vec<RemoteLink>, TrackerError> {
        let url = self.issue_url(key, "/remotelink");
        self.get_json(key, &url).await
    }

    async fn add_remote_link(
        &self,
        key: &IssueKey,
        link: &NewRemoteLink,
    ) -> Result<(), TrackerError> {
        let url = self.issue_url(key, "/remotelink");
        let body = json!({ "object": link });
        self.send_json(key, reqwest::Method::POST, &url, &body).await
    }

    async fn add_comment(&self, key: &IssueKey, body: &str) -> Result<(), TrackerError> {
        let url = self.issue_url(key, "/comment");
        let payload = json!({ "body": body });
        self.send_json(key, reqwest::Method::POST, &url, &payload)
            .await
    }

    async fn transitions(&self, key: &IssueKey) -> Result<Vec<Transition>, TrackerError> {
        #[derive(serde::Deserialize)]
        struct TransitionList {
            #[serde(default)]
            transitions: Vec<Transition>,
        }
        let url = self.issue_url(key, "/transitions");
        let list: TransitionList = self.get_json(key, &url).await?;
        Ok(list.transitions)
    }

    async fn apply_transition(
        &self,
        key: &IssueKey,
        transition_id: &str,
    ) -> Result<(), TrackerError> {
        let url = self.issue_url(key, "/transitions");
        let body = json!({ "transition": { "id": transition_id } });
        self.send_json(key, reqwest::Method::POST, &url, &body).await
    }

    async fn assign(&self, key: &IssueKey, user: &str) -> Result<(), TrackerError> {
        let url = self.issue_url(key, "/assignee");
        let body = json!({ "name": user });
        self.send_json(key, reqwest::Method::PUT, &url, &body).await
    }
}
