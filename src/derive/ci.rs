//! CI outcome derivation from the issue-thread comment stream.
//!
//! Two automation accounts post CI results: the primary bot posts detailed
//! outcomes ("Test build #N has started/finished"), the secondary bot posts
//! generic notices that largely duplicate them. Humans trigger builds with
//! commands like "ok to test" or "retest this please". This module folds the
//! whole stream, in chronological order, into a single status plus the one
//! comment it was derived from.
//!
//! The rules are ordered and first-match-per-branch: bot messages routinely
//! contain several keywords ("build finished: fail"), so a full pattern
//! match over the body would misclassify them.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::types::pr::Comment;

/// A command addressed to the CI system.
const COMMAND_PATTERN: &str = r"
        (jenkins,?\s*)?                     # Optional address, followed by a command:
        ((add\s+to\s+whitelist)
       |((this\s+is\s+)?ok\s+to\s+test)
       |((re)?test\s+this\s+please)
       |(skip\s+ci))
       \.?
";

fn command_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| extended(COMMAND_PATTERN))
}

fn sole_command_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| extended(&format!(r"^(?:{COMMAND_PATTERN}\s*)+$")))
}

fn extended(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .ignore_whitespace(true)
        .build()
        .expect("static pattern is valid")
}

/// Returns true if the comment contains a CI trigger command anywhere.
pub fn contains_ci_command(body: &str) -> bool {
    command_regex().is_match(body)
}

/// Returns true if the comment consists solely of CI trigger commands.
///
/// Heuristic: it is easy to spot the presence of a command, trickier to also
/// match surrounding prose that is part of one, so this only accepts bodies
/// that are nothing but commands.
pub fn is_sole_ci_command(body: &str) -> bool {
    // Bodies sometimes arrive with escaped newlines between stacked commands.
    let normalized = body.trim().replace("\\n", " ");
    sole_command_regex().is_match(&normalized)
}

/// Current CI status for a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CiStatus {
    #[default]
    Unknown,
    /// A human asked CI to run; no result yet.
    Asked,
    Pass,
    Fail,
    Running,
    /// CI wants an admin to vouch for the patch before testing it.
    Verify,
    Timeout,
}

/// The derived CI outcome: the final status and the comment it came from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CiOutcome {
    pub status: CiStatus,
    pub comment: Option<Comment>,
}

/// Folds the issue-thread comments into a CI outcome.
///
/// Later comments override earlier ones, with one exception: a generic
/// failure notice from the secondary bot directly following a detailed
/// failure/timeout from the primary bot is redundant and is suppressed (it
/// neither changes the status nor becomes the remembered comment, which lets
/// the garbage collector delete it).
pub fn compute_ci_outcome(comments: &[Comment], primary_bot: &str, secondary_bot: &str) -> CiOutcome {
    let mut ordered: Vec<&Comment> = comments.iter().collect();
    ordered.sort_by_key(|c| c.created_at);

    let mut status = CiStatus::Unknown;
    let mut relevant: Option<&Comment> = None;
    let mut prev_author: Option<&str> = None;

    for comment in ordered {
        if contains_ci_command(&comment.body) {
            status = CiStatus::Asked;
            relevant = Some(comment);
        } else if comment.author() == Some(secondary_bot) {
            let body = comment.body.to_lowercase();
            if body.contains("can one of the admins verify this patch?") {
                status = CiStatus::Verify;
                relevant = Some(comment);
            } else if body.contains("fail") {
                let redundant = prev_author == Some(primary_bot)
                    && matches!(status, CiStatus::Fail | CiStatus::Timeout);
                if !redundant {
                    status = CiStatus::Fail;
                    relevant = Some(comment);
                }
            }
        } else if comment.author() == Some(primary_bot) {
            let body = comment.body.to_lowercase();
            status = if body.contains("pass") {
                CiStatus::Pass
            } else if body.contains("fail") {
                CiStatus::Fail
            } else if body.contains("started") {
                CiStatus::Running
            } else if body.contains("timed out") {
                CiStatus::Timeout
            } else {
                // Unrecognized bot message: show Unknown rather than an
                // out-of-date status.
                CiStatus::Unknown
            };
            relevant = Some(comment);
        }
        prev_author = comment.author();
    }

    CiOutcome {
        status,
        comment: relevant.cloned(),
    }
}
