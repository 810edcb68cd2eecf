//! In-memory store implementations.
//!
//! Map-behind-RwLock, good enough for the daemon binary and the tests. A
//! deployment wanting durability swaps in its own `KvStore`/`MirrorStore`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvStore, MirrorStore, StoreError};
use crate::types::ids::{IssueKey, PrNumber};
use crate::types::issue::MirroredIssue;
use crate::types::pr::{MirroredPr, PrState};

#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMirrorStore {
    prs: RwLock<HashMap<PrNumber, MirroredPr>>,
    issues: RwLock<HashMap<IssueKey, MirroredIssue>>,
}

impl InMemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn get_pr(&self, number: PrNumber) -> Result<Option<MirroredPr>, StoreError> {
        Ok(self.prs.read().await.get(&number).cloned())
    }

    async fn put_pr(&self, pr: MirroredPr) -> Result<(), StoreError> {
        self.prs.write().await.insert(pr.number, pr);
        Ok(())
    }

    async fn open_prs_by_update_desc(&self) -> Result<Vec<MirroredPr>, StoreError> {
        let mut open: Vec<MirroredPr> = self
            .prs
            .read()
            .await
            .values()
            .filter(|pr| pr.state == PrState::Open)
            .cloned()
            .collect();
        open.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(open)
    }

    async fn get_issue(&self, key: &IssueKey) -> Result<Option<MirroredIssue>, StoreError> {
        Ok(self.issues.read().await.get(key).cloned())
    }

    async fn put_issue(&self, issue: MirroredIssue) -> Result<(), StoreError> {
        self.issues.write().await.insert(issue.key.clone(), issue);
        Ok(())
    }
}
