//! Pipeline configuration.
//!
//! Thresholds, bot account names, noise-tag lists and the tracker project
//! key are passed explicitly into the orchestrators and the derived-state
//! computer rather than read as ambient global state. Values come from
//! environment variables with defaults matching the Spark dashboard this
//! pipeline was built for.

use std::time::Duration;

use crate::derive::components::ComponentRule;

/// Default freshness threshold: items updated within the last day are routed
/// to the fresh queue.
const DEFAULT_FRESHNESS_SECS: u64 = 86_400;

/// Default interval between sync passes (5 minutes).
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Largest number of tasks one `enqueue_batch` call may carry.
const DEFAULT_MAX_ENQUEUE_BATCH: usize = 100;

/// Configuration for the sync/derivation pipeline.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Items updated more recently than this go to the fresh-PRs queue.
    pub freshness_threshold: Duration,

    /// Interval between scheduled sync passes.
    pub sync_interval: Duration,

    /// Per-call limit of the task-dispatch batch API.
    pub max_enqueue_batch: usize,

    /// The automation account that posts detailed CI outcomes.
    pub primary_ci_bot: String,

    /// The automation account that posts generic/redundant CI notices.
    pub secondary_ci_bot: String,

    /// Tracker project key; issue keys look like `{project}-{digits}`.
    pub tracker_project: String,

    /// Bracketed tags stripped from parsed title metadata, since they are
    /// redundant once a PR is auto-classified.
    pub noise_tags: Vec<String>,

    /// Ordered component classification rules.
    pub component_rules: Vec<ComponentRule>,

    /// Workflow transition to apply on the tracker issue after first linking
    /// it to a PR, by transition name. `None` disables transitions.
    pub link_transition: Option<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorConfig {
    pub fn new() -> Self {
        MirrorConfig {
            freshness_threshold: Duration::from_secs(DEFAULT_FRESHNESS_SECS),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            max_enqueue_batch: DEFAULT_MAX_ENQUEUE_BATCH,
            primary_ci_bot: "SparkQA".to_string(),
            secondary_ci_bot: "AmplabJenkins".to_string(),
            tracker_project: "SPARK".to_string(),
            noise_tags: ["MLLIB", "CORE", "PYSPARK", "SQL", "STREAMING", "YARN", "GRAPHX"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            component_rules: ComponentRule::default_rules(),
            link_transition: None,
        }
    }

    /// Builds a config from environment variables, falling back to defaults
    /// for anything unset.
    ///
    /// Recognized variables: `PR_MIRROR_FRESHNESS_SECS`,
    /// `PR_MIRROR_SYNC_INTERVAL_SECS`, `PR_MIRROR_PRIMARY_BOT`,
    /// `PR_MIRROR_SECONDARY_BOT`, `PR_MIRROR_TRACKER_PROJECT`,
    /// `PR_MIRROR_LINK_TRANSITION`.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(secs) = env_u64("PR_MIRROR_FRESHNESS_SECS") {
            config.freshness_threshold = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("PR_MIRROR_SYNC_INTERVAL_SECS") {
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Ok(bot) = std::env::var("PR_MIRROR_PRIMARY_BOT") {
            config.primary_ci_bot = bot;
        }
        if let Ok(bot) = std::env::var("PR_MIRROR_SECONDARY_BOT") {
            config.secondary_ci_bot = bot;
        }
        if let Ok(project) = std::env::var("PR_MIRROR_TRACKER_PROJECT") {
            config.tracker_project = project;
        }
        if let Ok(transition) = std::env::var("PR_MIRROR_LINK_TRANSITION") {
            config.link_transition = Some(transition);
        }
        config
    }

    /// The automation accounts excluded from commenter roll-ups.
    pub fn excluded_commenters(&self) -> [&str; 2] {
        [self.primary_ci_bot.as_str(), self.secondary_ci_bot.as_str()]
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
