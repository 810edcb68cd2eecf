//! Commenter roll-up.
//!
//! Issue-thread and diff comments are merged into one chronological stream
//! and grouped by author, so the dashboard shows each participant once with
//! their latest contribution. Pure CI-command comments and the automation
//! bots are excluded; comments whose author account was deleted upstream are
//! skipped.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::ci::is_sole_ci_command;
use crate::types::pr::Comment;

/// How many trailing lines of diff context to keep per comment.
const DIFF_CONTEXT_LINES: usize = 10;

fn approval_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new("lgtm")
            .case_insensitive(true)
            .build()
            .expect("static pattern is valid")
    })
}

fn asked_to_close_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(
            r"(mind\s+closing\s+(this|it))|(close\s+this\s+(issue|pr))",
        )
        .case_insensitive(true)
        .build()
        .expect("static pattern is valid")
    })
}

/// One author's roll-up across both comment streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commenter {
    pub username: String,
    /// URL of the author's most recent comment.
    pub url: Option<String>,
    pub avatar_url: Option<String>,
    /// Creation time of the author's most recent comment.
    pub last_comment_at: DateTime<Utc>,
    /// Body of the author's most recent comment.
    pub body: String,
    /// Trailing lines of diff context from the most recent comment, when it
    /// was a diff comment.
    pub diff_context: Option<String>,
    /// True once any of the author's comments matched the approval keyword.
    /// Sticky: never resets.
    pub expressed_approval: bool,
    /// True once any of the author's comments asked to close the PR. Sticky.
    pub asked_to_close: bool,
}

/// Merges both comment streams into a per-author roll-up, latest commenter
/// first.
pub fn compute_commenters(
    issue_comments: &[Comment],
    review_comments: &[Comment],
    excluded_users: &[&str],
) -> Vec<Commenter> {
    let mut all: Vec<&Comment> = issue_comments.iter().chain(review_comments.iter()).collect();
    all.sort_by_key(|c| c.created_at);

    let mut by_author: HashMap<String, Commenter> = HashMap::new();
    for comment in all {
        if is_sole_ci_command(&comment.body) {
            continue;
        }
        let Some(user) = comment.user.as_ref() else {
            // Deleted upstream account; nothing to attribute the comment to.
            continue;
        };
        if excluded_users.contains(&user.login.as_str()) {
            continue;
        }

        let entry = by_author
            .entry(user.login.clone())
            .or_insert_with(|| Commenter {
                username: user.login.clone(),
                url: None,
                avatar_url: None,
                last_comment_at: comment.created_at,
                body: String::new(),
                diff_context: None,
                expressed_approval: false,
                asked_to_close: false,
            });
        entry.url = comment.html_url.clone();
        entry.avatar_url = user.avatar_url.clone();
        entry.last_comment_at = comment.created_at;
        entry.body = comment.body.clone();
        entry.diff_context = comment.diff_hunk.as_deref().map(trailing_lines);
        entry.expressed_approval =
            entry.expressed_approval || approval_regex().is_match(&comment.body);
        entry.asked_to_close =
            entry.asked_to_close || asked_to_close_regex().is_match(&comment.body);
    }

    let mut commenters: Vec<Commenter> = by_author.into_values().collect();
    commenters.sort_by(|a, b| b.last_comment_at.cmp(&a.last_comment_at));
    commenters
}

fn trailing_lines(hunk: &str) -> String {
    let lines: Vec<&str> = hunk.split('\n').collect();
    let start = lines.len().saturating_sub(DIFF_CONTEXT_LINES);
    lines[start..].join("\n")
}
