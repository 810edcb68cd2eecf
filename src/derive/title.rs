//! Pull request title parsing.
//!
//! Titles usually open with a metadata run of bracketed tags and/or tracker
//! keys (`[SPARK-975] [core] Visual debugger ...`) followed by the actual
//! title. The parser splits off that run, strips separator punctuation from
//! the remainder, and extracts tracker ids from the *whole* title, since
//! authors sometimes embed keys mid-sentence.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Result of parsing a PR title.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedTitle {
    /// Numeric ids of every tracker key found anywhere in the title.
    pub tracker_ids: Vec<u64>,
    /// The free-text title with the metadata run and leading separators removed.
    pub title: String,
    /// The metadata run, minus tracker keys and configured noise tags.
    pub metadata: String,
}

/// Compiled title parser for one tracker project key.
#[derive(Debug, Clone)]
pub struct TitleParser {
    /// Matches the leading metadata run: bracketed tags and/or tracker keys.
    metadata: Regex,
    /// Matches a tracker key anywhere, capturing the numeric id.
    key: Regex,
    /// Matches a tracker key inside the metadata run, brackets included.
    bracketed_key: Regex,
    /// Matches any configured noise tag, brackets included. `None` when the
    /// noise list is empty.
    noise: Option<Regex>,
}

impl TitleParser {
    pub fn new(project: &str, noise_tags: &[String]) -> Result<Self, regex::Error> {
        let project = regex::escape(project);
        let metadata = Regex::new(&format!(
            r"(?i)^((?:\[[^\]]*\]\s*|{project}-\d+\s*)*)"
        ))?;
        let key = Regex::new(&format!(r"(?i){project}-(\d+)"))?;
        let bracketed_key = Regex::new(&format!(r"(?i)\[?{project}-\d+\]?"))?;
        let noise = if noise_tags.is_empty() {
            None
        } else {
            let alternatives = noise_tags
                .iter()
                .map(|tag| format!(r"(?:\[?{}\]?)", regex::escape(tag)))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(r"(?i){alternatives}"))?)
        };
        Ok(TitleParser {
            metadata,
            key,
            bracketed_key,
            noise,
        })
    }

    pub fn parse(&self, pr_title: &str) -> ParsedTitle {
        // The metadata regex matches a (possibly empty) prefix, so find()
        // always succeeds at position 0.
        let metadata_end = self
            .metadata
            .find(pr_title)
            .map(|m| m.end())
            .unwrap_or(0);
        let metadata_run = &pr_title[..metadata_end];
        let rest = &pr_title[metadata_end..];

        // Strip punctuation that separated the keys/tags from the title text.
        let title = rest
            .trim_start_matches([':', '-', '.'])
            .trim()
            .to_string();

        let tracker_ids = self
            .key
            .captures_iter(pr_title)
            .filter_map(|c| c[1].parse().ok())
            .collect();

        // Tracker keys and noise tags are redundant once the PR is
        // auto-classified, so drop them from the returned metadata.
        let metadata = self.bracketed_key.replace_all(metadata_run, "");
        let metadata = match &self.noise {
            Some(noise) => noise.replace_all(&metadata, "").trim().to_string(),
            None => metadata.trim().to_string(),
        };

        ParsedTitle {
            tracker_ids,
            title,
            metadata,
        }
    }
}
