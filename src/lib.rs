//! PR Mirror - a sync and derivation pipeline for pull requests and their
//! tracker issues.
//!
//! The pipeline mirrors pull requests from an upstream source into local
//! records, derives presentation facts (components, parsed titles, commenter
//! roll-ups, CI outcomes) from the raw snapshots, back-links referenced
//! tracker issues, and garbage-collects stale CI bot comments.

pub mod config;
pub mod derive;
pub mod github;
pub mod queue;
pub mod store;
pub mod sync;
pub mod tracker;
pub mod types;
pub mod worker;
