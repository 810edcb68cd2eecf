use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pr_mirror::config::MirrorConfig;
use pr_mirror::github::GithubClient;
use pr_mirror::queue::{InMemoryQueue, QueueName, RefreshTask};
use pr_mirror::store::{InMemoryKvStore, InMemoryMirrorStore};
use pr_mirror::sync::{IssueSyncOrchestrator, SyncOrchestrator};
use pr_mirror::tracker::{CrossReferenceLinker, TrackerClient};
use pr_mirror::worker::{IssueRefreshWorker, PrRefreshWorker};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pr_mirror=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MirrorConfig::from_env();

    let repo = std::env::var("PR_MIRROR_REPO").unwrap_or_else(|_| "apache/spark".to_string());
    let github_token = std::env::var("GITHUB_TOKEN").ok();
    let source = Arc::new(GithubClient::new(
        "https://api.github.com",
        repo.clone(),
        github_token,
    ));

    let tracker_base = std::env::var("TRACKER_API_BASE")
        .unwrap_or_else(|_| "https://issues.apache.org/jira".to_string());
    let tracker_user = std::env::var("TRACKER_USERNAME").unwrap_or_default();
    let tracker_password = std::env::var("TRACKER_PASSWORD").unwrap_or_default();
    let tracker = Arc::new(TrackerClient::new(
        tracker_base,
        tracker_user,
        tracker_password,
    ));

    let kv = Arc::new(InMemoryKvStore::new());
    let store = Arc::new(InMemoryMirrorStore::new());
    let queue = Arc::new(InMemoryQueue::new());

    let linker = CrossReferenceLinker::new(tracker.clone(), config.link_transition.clone());
    let pr_worker = Arc::new(
        PrRefreshWorker::new(source.clone(), store.clone(), linker, &config)
            .expect("built-in derivation patterns are valid"),
    );
    let issue_worker = Arc::new(IssueRefreshWorker::new(tracker.clone(), store.clone()));

    for queue_name in [QueueName::FreshPrs, QueueName::OldPrs, QueueName::TrackerIssues] {
        let mut rx = queue
            .take_receiver(queue_name)
            .await
            .expect("receivers are taken once at startup");
        let pr_worker = pr_worker.clone();
        let issue_worker = issue_worker.clone();
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let result = match &task {
                    RefreshTask::Pr { number } => {
                        pr_worker.refresh_pr(*number).await.map(|_| ())
                    }
                    RefreshTask::TrackerIssue { key } => issue_worker.refresh_issue(key).await,
                };
                if let Err(error) = result {
                    tracing::warn!(%task, queue = %queue_name, %error, "refresh task failed");
                }
            }
        });
    }

    let orchestrator = SyncOrchestrator::new(source, kv.clone(), queue.clone(), &config);
    let issue_orchestrator = IssueSyncOrchestrator::new(tracker, kv, queue, &config);
    tracing::info!(%repo, interval = ?config.sync_interval, "starting sync loop");

    let mut ticker = tokio::time::interval(config.sync_interval);
    loop {
        ticker.tick().await;
        if let Err(error) = orchestrator.run_once(Utc::now()).await {
            tracing::warn!(%error, "sync pass failed; will retry next interval");
        }
        if let Err(error) = issue_orchestrator.run_once().await {
            tracing::warn!(%error, "issue sync pass failed; will retry next interval");
        }
    }
}
