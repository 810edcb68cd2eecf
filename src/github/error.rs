//! Fetch error taxonomy for the PR source API.
//!
//! "Not modified" is not an error: conditional fetches express it as
//! [`Fetched::Unchanged`](super::Fetched). The variants here cover the
//! failures a refresh task can hit, so callers can tell a vanished resource
//! apart from a transient upstream problem.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The resource vanished upstream (HTTP 404). Distinct so a refresh of a
    /// deleted PR can be told apart from a transient failure.
    #[error("resource not found: {url}")]
    NotFound { url: String },

    /// Any other non-success status. Fatal for the current task; the
    /// surrounding at-least-once dispatch retries it.
    #[error("unexpected status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not decode as the expected document.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}
