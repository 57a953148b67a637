//! 进程内存储

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use super::SubmissionStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{load_queue_seed, Submission, SubmissionStatus, SubmissionUpdate};

#[derive(Default)]
pub struct MemoryStore {
    jobs: Mutex<Vec<Submission>>,
}

impl MemoryStore {
    pub fn new(jobs: Vec<Submission>) -> Self {
        Self {
            jobs: Mutex::new(jobs),
        }
    }

    /// 从 TOML 种子文件加载
    pub async fn from_seed_file(path: &Path) -> Result<Self> {
        Ok(Self::new(load_queue_seed(path).await?))
    }

    fn jobs(&self) -> MutexGuard<'_, Vec<Submission>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, job: Submission) {
        self.jobs().push(job);
    }

    pub fn get(&self, id: &str) -> Option<Submission> {
        self.jobs().iter().find(|job| job.id == id).cloned()
    }

    /// 所有作业的当前状态
    pub fn snapshot(&self) -> Vec<Submission> {
        self.jobs().clone()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn fetch_pending(
        &self,
        limit: usize,
        max_retry_count: u32,
    ) -> StoreResult<Vec<Submission>> {
        let now = Utc::now();
        let mut pending: Vec<Submission> = self
            .jobs()
            .iter()
            .filter(|job| {
                job.status == SubmissionStatus::Pending
                    && job.retry_count < max_retry_count
                    && job.is_due(now)
            })
            .cloned()
            .collect();

        pending.sort_by_key(|job| job.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn claim(
        &self,
        id: &str,
        title_used: Option<String>,
        description_used: Option<String>,
    ) -> StoreResult<bool> {
        let mut jobs = self.jobs();
        let job = jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if job.status != SubmissionStatus::Pending {
            return Ok(false);
        }
        job.apply(&SubmissionUpdate::in_progress(title_used, description_used));
        Ok(true)
    }

    async fn update(&self, id: &str, update: &SubmissionUpdate) -> StoreResult<()> {
        let mut jobs = self.jobs();
        let job = jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        job.apply(update);
        Ok(())
    }
}
