//! Component classification.
//!
//! An ordered table of rules, each pairing a label with a title pattern and
//! a file-path pattern. A rule matches when the title pattern matches the PR
//! title *or* the path pattern matches any changed file. A PR collects the
//! label of every matching rule; when nothing matches it is classified as
//! plain `Core` so the label set is never empty.

use regex::{Regex, RegexBuilder};

/// One classification rule. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct ComponentRule {
    pub label: String,
    title_pattern: Regex,
    path_pattern: Regex,
}

impl ComponentRule {
    pub fn new(label: &str, title_pattern: &str, path_pattern: &str) -> Result<Self, regex::Error> {
        Ok(ComponentRule {
            label: label.to_string(),
            title_pattern: case_insensitive(title_pattern)?,
            path_pattern: case_insensitive(path_pattern)?,
        })
    }

    fn matches(&self, title: &str, file_paths: &[&str]) -> bool {
        self.title_pattern.is_match(title)
            || file_paths.iter().any(|path| self.path_pattern.is_match(path))
    }

    /// The rule table for the Spark repository this dashboard was built for.
    pub fn default_rules() -> Vec<ComponentRule> {
        [
            ("SQL", r"\[sql\]", r"^sql/"),
            ("MLlib", r"ml-?lib", r"^mllib/"),
            ("GraphX", r"graphx|pregel", r"^graphx/"),
            ("Streaming", r"stream|flume|kafka|twitter|zeromq", r"^streaming/"),
            ("Python", r"python|pyspark", r"^python/"),
            ("YARN", r"\[yarn\]", r"^yarn/"),
            ("R", r"\[sparkr\]", r"^r/"),
            ("Docs", r"docs?", r"^docs/"),
            ("Build", r"build", r"^(dev|project)/"),
        ]
        .iter()
        .map(|(label, title, path)| {
            ComponentRule::new(label, title, path).expect("default rule patterns are valid")
        })
        .collect()
    }
}

/// Classifies a PR by title and changed-file paths.
///
/// `title` falls back to the empty string upstream when no title is known;
/// the result is then driven purely by file paths.
pub fn classify(title: &str, file_paths: &[&str], rules: &[ComponentRule]) -> Vec<String> {
    let matched: Vec<String> = rules
        .iter()
        .filter(|rule| rule.matches(title, file_paths))
        .map(|rule| rule.label.clone())
        .collect();
    if matched.is_empty() {
        vec!["Core".to_string()]
    } else {
        matched
    }
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}
