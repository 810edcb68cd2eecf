//! Stale-comment garbage collection.
//!
//! The two CI bots clutter PR threads. After a refresh, exactly one
//! secondary-bot comment is worth keeping (the one the CI outcome was
//! derived from); every other secondary-bot comment is deleted. For the
//! primary bot, a "build N started" notice becomes stale as soon as a later
//! "build N finished" or "build N timed out" notice exists, so the start
//! notice is deleted once its terminal counterpart appears.
//!
//! Planning is pure (and unit-tested); execution issues one upstream delete
//! per planned comment, logging failures instead of aborting the refresh.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::derive::ci::CiOutcome;
use crate::github::PrSource;
use crate::types::ids::CommentId;
use crate::types::pr::Comment;

fn build_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)build\s*#?\s*(\d+)").expect("static pattern is valid"))
}

fn build_number(body: &str) -> Option<u64> {
    build_number_regex()
        .captures(body)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Computes the set of bot comments that are safe to delete.
pub fn plan_deletions<'a>(
    issue_comments: &'a [Comment],
    ci_outcome: &CiOutcome,
    primary_bot: &str,
    secondary_bot: &str,
) -> Vec<&'a Comment> {
    let mut ordered: Vec<&Comment> = issue_comments.iter().collect();
    ordered.sort_by_key(|c| c.created_at);

    let keep_secondary: Option<CommentId> = ci_outcome
        .comment
        .as_ref()
        .filter(|c| c.author() == Some(secondary_bot))
        .map(|c| c.id);

    let mut deletions = Vec::new();

    // Every secondary-bot comment except the remembered one is redundant.
    for comment in &ordered {
        if comment.author() == Some(secondary_bot) && Some(comment.id) != keep_secondary {
            deletions.push(*comment);
        }
    }

    // Primary bot: a start notice is stale once a later terminal notice for
    // the same build number exists.
    for (idx, comment) in ordered.iter().enumerate() {
        if comment.author() != Some(primary_bot) {
            continue;
        }
        let body = comment.body.to_lowercase();
        if !body.contains("started") {
            continue;
        }
        let Some(number) = build_number(&comment.body) else {
            continue;
        };
        let finished = ordered[idx + 1..].iter().any(|later| {
            if later.author() != Some(primary_bot) {
                return false;
            }
            let later_body = later.body.to_lowercase();
            (later_body.contains("finished") || later_body.contains("timed out"))
                && build_number(&later.body) == Some(number)
        });
        if finished {
            deletions.push(*comment);
        }
    }

    // A comment can qualify under both rules; delete it once.
    let mut seen = HashSet::new();
    deletions.retain(|c| seen.insert(c.id));
    deletions
}

/// Executes a deletion plan against the upstream delete API.
///
/// Returns the number of comments actually deleted. Individual failures are
/// logged and skipped: the next refresh will plan them again.
pub async fn collect_stale_comments(
    source: &dyn PrSource,
    issue_comments: &[Comment],
    ci_outcome: &CiOutcome,
    primary_bot: &str,
    secondary_bot: &str,
) -> usize {
    let plan = plan_deletions(issue_comments, ci_outcome, primary_bot, secondary_bot);
    let mut deleted = 0;
    for comment in plan {
        let Some(url) = comment.url.as_deref() else {
            tracing::debug!(comment = %comment.id, "stale comment has no API URL; skipping");
            continue;
        };
        match source.delete_comment(url).await {
            Ok(()) => deleted += 1,
            Err(error) => {
                tracing::warn!(comment = %comment.id, %error, "failed to delete stale comment");
            }
        }
    }
    deleted
}
