//! Derived-state computation.
//!
//! Everything in this module is a pure function of the raw snapshots held on
//! a mirrored record. Derived fields are recomputed wholesale at the end of
//! every refresh and are never fed back into future derivation.

pub mod ci;
pub mod commenters;
pub mod components;
pub mod title;

pub use ci::{compute_ci_outcome, contains_ci_command, is_sole_ci_command, CiOutcome, CiStatus};
pub use commenters::{compute_commenters, Commenter};
pub use components::{classify, ComponentRule};
pub use title::{ParsedTitle, TitleParser};

use crate::config::MirrorConfig;
use crate::types::pr::{DerivedState, MirroredPr};

/// Compiled derivation context: the config-driven regexes and rule table,
/// built once and shared by the refresh workers.
#[derive(Debug, Clone)]
pub struct DeriveContext {
    title_parser: TitleParser,
    rules: Vec<ComponentRule>,
    primary_ci_bot: String,
    secondary_ci_bot: String,
}

impl DeriveContext {
    pub fn new(config: &MirrorConfig) -> Result<Self, regex::Error> {
        Ok(DeriveContext {
            title_parser: TitleParser::new(&config.tracker_project, &config.noise_tags)?,
            rules: config.component_rules.clone(),
            primary_ci_bot: config.primary_ci_bot.clone(),
            secondary_ci_bot: config.secondary_ci_bot.clone(),
        })
    }

    pub fn title_parser(&self) -> &TitleParser {
        &self.title_parser
    }

    /// Recomputes every derived field from the record's current raw
    /// snapshots. Partial snapshots are fine: a missing detail falls back to
    /// the cached title, missing streams contribute nothing.
    pub fn compute(&self, pr: &MirroredPr) -> DerivedState {
        let title = pr.effective_title().unwrap_or_default();
        let file_paths: Vec<&str> = pr
            .changed_files
            .iter()
            .map(|f| f.filename.as_str())
            .collect();

        DerivedState {
            components: classify(&title, &file_paths, &self.rules),
            parsed_title: self.title_parser.parse(&title),
            commenters: compute_commenters(
                &pr.issue_comments,
                &pr.review_comments,
                &[&self.primary_ci_bot, &self.secondary_ci_bot],
            ),
            ci_outcome: compute_ci_outcome(
                &pr.issue_comments,
                &self.primary_ci_bot,
                &self.secondary_ci_bot,
            ),
        }
    }
}
