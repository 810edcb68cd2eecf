//! Task dispatch: named queues of refresh tasks.
//!
//! The orchestrators only enqueue; execution, retries and at-least-once
//! redelivery belong to whatever runs the workers. Handlers are idempotent
//! precisely because duplicates can arrive from that layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::types::ids::{IssueKey, PrNumber};

/// The queues work is fanned out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    /// PRs updated within the freshness threshold.
    FreshPrs,
    /// Everything older; drained at lower priority.
    OldPrs,
    TrackerIssues,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::FreshPrs => "fresh-prs",
            QueueName::OldPrs => "old-prs",
            QueueName::TrackerIssues => "tracker-issues",
        }
    }

    pub const ALL: [QueueName; 3] = [
        QueueName::FreshPrs,
        QueueName::OldPrs,
        QueueName::TrackerIssues,
    ];
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one unit of refresh work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshTask {
    Pr { number: PrNumber },
    TrackerIssue { key: IssueKey },
}

impl fmt::Display for RefreshTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshTask::Pr { number } => write!(f, "refresh-pr-{}", number.0),
            RefreshTask::TrackerIssue { key } => write!(f, "refresh-issue-{key}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue {queue} rejected the enqueue: {reason}")]
    Rejected { queue: QueueName, reason: String },

    #[error("batch of {size} exceeds the per-call limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
}

/// The dispatch API the orchestrators fan out through.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, queue: QueueName, task: RefreshTask) -> Result<(), QueueError>;

    /// Enqueues up to `max_batch_size` tasks in one call. Callers split
    /// larger collections into batches themselves.
    async fn enqueue_batch(
        &self,
        queue: QueueName,
        tasks: Vec<RefreshTask>,
        max_batch_size: usize,
    ) -> Result<(), QueueError>;
}

/// Unbounded in-process queue backed by one channel per queue name.
pub struct InMemoryQueue {
    senders: Vec<(QueueName, mpsc::UnboundedSender<RefreshTask>)>,
    receivers: Mutex<Vec<(QueueName, mpsc::UnboundedReceiver<RefreshTask>)>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        let mut senders = Vec::new();
        let mut receivers = Vec::new();
        for queue in QueueName::ALL {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push((queue, tx));
            receivers.push((queue, rx));
        }
        InMemoryQueue {
            senders,
            receivers: Mutex::new(receivers),
        }
    }

    fn sender(&self, queue: QueueName) -> &mpsc::UnboundedSender<RefreshTask> {
        // QueueName::ALL seeds every queue, so the lookup cannot miss.
        &self
            .senders
            .iter()
            .find(|(name, _)| *name == queue)
            .expect("every queue name is seeded")
            .1
    }

    /// Takes the consuming end of a queue. Each queue's receiver can be
    /// taken once, by the worker pool that drains it.
    pub async fn take_receiver(
        &self,
        queue: QueueName,
    ) -> Option<mpsc::UnboundedReceiver<RefreshTask>> {
        let mut receivers = self.receivers.lock().await;
        receivers
            .iter()
            .position(|(name, _)| *name == queue)
            .map(|idx| receivers.swap_remove(idx).1)
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn enqueue(&self, queue: QueueName, task: RefreshTask) -> Result<(), QueueError> {
        self.sender(queue)
            .send(task)
            .map_err(|e| QueueError::Rejected {
                queue,
                reason: e.to_string(),
            })
    }

    async fn enqueue_batch(
        &self,
        queue: QueueName,
        tasks: Vec<RefreshTask>,
        max_batch_size: usize,
    ) -> Result<(), QueueError> {
        if tasks.len() > max_batch_size {
            return Err(QueueError::BatchTooLarge {
                size: tasks.len(),
                limit: max_batch_size,
            });
        }
        for task in tasks {
            self.enqueue(queue, task).await?;
        }
        Ok(())
    }
}
