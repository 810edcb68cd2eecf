//! Reqwest-backed PR source client.
//!
//! All reads go through two primitives: a single-page conditional GET for
//! detail documents, and a conditional paginator that follows the response's
//! `Link: rel="next"` relation iteratively, concatenating decoded items
//! across pages. The revision tag returned by the paginator is always the
//! *first* page's ETag; the feeds this pipeline polls only change at the
//! head, so a matching first-page tag means nothing changed at all.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, IF_NONE_MATCH, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::error::FetchError;
use super::{Fetched, FeedCursor, FeedPage, PrSource};
use crate::types::ids::{PrNumber, RevisionTag};
use crate::types::pr::{ChangedFile, Comment, PrDetail, PrSummary};

const USER_AGENT: &str = "pr-mirror";
const PAGE_SIZE: u32 = 100;

/// Client for one mirrored repository.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    repo: String,
    token: Option<String>,
}

impl GithubClient {
    /// `repo` is the `owner/name` pair; `api_base` is normally
    /// `https://api.github.com`.
    pub fn new(api_base: impl Into<String>, repo: impl Into<String>, token: Option<String>) -> Self {
        GithubClient {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repo: repo.into(),
            token,
        }
    }

    fn pulls_url(&self, path: &str) -> String {
        format!("{}/repos/{}/pulls{}", self.api_base, self.repo, path)
    }

    fn issues_url(&self, path: &str) -> String {
        format!("{}/repos/{}/issues{}", self.api_base, self.repo, path)
    }

    /// Performs one conditional GET. `Ok(None)` means "not modified".
    async fn get(
        &self,
        url: &str,
        tag: Option<&RevisionTag>,
    ) -> Result<Option<reqwest::Response>, FetchError> {
        let mut request = self.http.get(url).header("User-Agent", USER_AGENT);
        if let Some(tag) = tag {
            request = request.header(IF_NONE_MATCH, tag.as_str());
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_MODIFIED => Ok(None),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                url: url.to_string(),
            }),
            status if status.is_success() => Ok(Some(response)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(FetchError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body,
                })
            }
        }
    }

    async fn decode<T: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, FetchError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Single-page conditional fetch for detail resources.
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        url: &str,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<T>, FetchError> {
        let Some(response) = self.get(url, tag).await? else {
            return Ok(Fetched::Unchanged);
        };
        let revision = revision_tag(response.headers());
        let value = Self::decode(url, response).await?;
        Ok(Fetched::Fresh { value, revision })
    }

    /// Conditional fetch following the "next page" relation until exhausted.
    ///
    /// The loop is iterative rather than recursive: long feeds must not grow
    /// the call stack.
    pub async fn fetch_paginated<T: DeserializeOwned>(
        &self,
        url: &str,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<Vec<T>>, FetchError> {
        let Some(first) = self.get(url, tag).await? else {
            return Ok(Fetched::Unchanged);
        };
        let revision = revision_tag(first.headers());
        let mut next = next_link(first.headers());
        let mut items: Vec<T> = Self::decode(url, first).await?;

        while let Some(page_url) = next {
            // Only the first page is conditional; followup pages have no
            // stored tag to replay.
            let Some(response) = self.get(&page_url, None).await? else {
                break;
            };
            next = next_link(response.headers());
            let mut page: Vec<T> = Self::decode(&page_url, response).await?;
            items.append(&mut page);
        }

        Ok(Fetched::Fresh {
            value: items,
            revision,
        })
    }
}

/// The ETag of a response; upstream sends one with every 200.
fn revision_tag(headers: &HeaderMap) -> RevisionTag {
    headers
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(RevisionTag::new)
        .unwrap_or_else(|| RevisionTag::new(""))
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(LINK)?.to_str().ok()?;
    parse_next_link(header)
}

/// Parses a `Link` header value, returning the `rel="next"` URL if present.
///
/// Format: `<https://...&page=2>; rel="next", <https://...&page=5>; rel="last"`.
pub fn parse_next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut pieces = part.trim().split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces
            .any(|param| param.trim().eq_ignore_ascii_case(r#"rel="next""#));
        if is_next && target.starts_with('<') && target.ends_with('>') {
            return Some(target[1..target.len() - 1].to_string());
        }
    }
    None
}

#[async_trait]
impl PrSource for GithubClient {
    async fn pr_detail(
        &self,
        number: PrNumber,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<PrDetail>, FetchError> {
        let url = self.pulls_url(&format!("/{}", number.0));
        self.fetch_one(&url, tag).await
    }

    async fn issue_comments(
        &self,
        number: PrNumber,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<Vec<Comment>>, FetchError> {
        let url = self.issues_url(&format!("/{}/comments?per_page={PAGE_SIZE}", number.0));
        self.fetch_paginated(&url, tag).await
    }

    async fn review_comments(
        &self,
        number: PrNumber,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<Vec<Comment>>, FetchError> {
        let url = self.pulls_url(&format!("/{}/comments?per_page={PAGE_SIZE}", number.0));
        self.fetch_paginated(&url, tag).await
    }

    async fn changed_files(
        &self,
        number: PrNumber,
        tag: Option<&RevisionTag>,
    ) -> Result<Fetched<Vec<ChangedFile>>, FetchError> {
        let url = self.pulls_url(&format!("/{}/files?per_page={PAGE_SIZE}", number.0));
        self.fetch_paginated(&url, tag).await
    }

    async fn recently_updated_page(
        &self,
        cursor: Option<&FeedCursor>,
    ) -> Result<FeedPage, FetchError> {
        let url = match cursor {
            Some(FeedCursor(url)) => url.clone(),
            None => self.issues_url(&format!(
                "?sort=updated&direction=desc&state=all&per_page={PAGE_SIZE}"
            )),
        };
        let Some(response) = self.get(&url, None).await? else {
            // Unconditional request; upstream cannot answer "not modified".
            return Ok(FeedPage {
                items: Vec::new(),
                next: None,
            });
        };
        let next = next_link(response.headers()).map(FeedCursor);
        let items: Vec<PrSummary> = Self::decode(&url, response).await?;
        Ok(FeedPage { items, next })
    }

    async fn newest_pr_number(&self) -> Result<Option<PrNumber>, FetchError> {
        let url = self.issues_url("?sort=created&direction=desc&state=all&per_page=1");
        let Some(response) = self.get(&url, None).await? else {
            return Ok(None);
        };
        let items: Vec<PrSummary> = Self::decode(&url, response).await?;
        Ok(items.first().map(|item| item.number))
    }

    async fn delete_comment(&self, url: &str) -> Result<(), FetchError> {
        let mut request = self.http.delete(url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        // 404 means another worker already deleted it; fine either way.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            })
        }
    }
}
