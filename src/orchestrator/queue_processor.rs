//! 队列处理器 - 编排层
//!
//! ## 核心功能
//!
//! 1. **批量读取**：最多 `batch_size` 个待处理作业，按创建时间升序
//! 2. **串行处理**：逐个委托给 [`SubmissionFlow`]，不并发
//! 3. **错误隔离**：流程出错只记录到该作业的结果里
//! 4. **拟人节奏**：作业之间随机停顿
//! 5. **批次汇总**：返回计数和每个作业的结果
//!
//! 同一进程内的批次互斥：第二次触发会等待正在进行的批次结束。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::adapters::base::human_delay;
use crate::adapters::AdapterRegistry;
use crate::browser::BrowserManager;
use crate::config::Config;
use crate::store::SubmissionStore;
use crate::utils::logging::{log_batch_complete, log_batch_start};
use crate::workflow::{JobOutcome, SubmissionCtx, SubmissionFlow};

/// 批处理参数
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub batch_size: usize,
    /// 读取时的 retry_count 上限
    pub max_retry_count: u32,
    /// 作业间停顿（毫秒）
    pub inter_job_delay_ms: (u64, u64),
    pub user_agent: String,
}

impl ProcessorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            max_retry_count: config.max_retry_count,
            inter_job_delay_ms: (config.inter_job_delay_min_ms, config.inter_job_delay_max_ms),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// 一次批处理的汇总
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<JobOutcome>,
    pub timestamp: DateTime<Utc>,
}

impl BatchSummary {
    fn from_results(results: Vec<JobOutcome>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.iter().filter(|r| !r.success && !r.skipped).count();
        Self {
            processed: results.len(),
            succeeded,
            failed,
            results,
            timestamp: Utc::now(),
        }
    }
}

/// 队列处理器
pub struct QueueProcessor {
    store: Arc<dyn SubmissionStore>,
    browser: Arc<BrowserManager>,
    flow: SubmissionFlow,
    settings: ProcessorSettings,
    batch_counter: AtomicU64,
    batch_lock: Mutex<()>,
}

impl QueueProcessor {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        browser: Arc<BrowserManager>,
        registry: Arc<AdapterRegistry>,
        settings: ProcessorSettings,
    ) -> Self {
        let flow = SubmissionFlow::new(
            Arc::clone(&store),
            Arc::clone(&browser),
            registry,
            settings.user_agent.clone(),
            settings.max_retry_count,
        );
        Self {
            store,
            browser,
            flow,
            settings,
            batch_counter: AtomicU64::new(0),
            batch_lock: Mutex::new(()),
        }
    }

    pub fn browser(&self) -> &Arc<BrowserManager> {
        &self.browser
    }

    /// 处理一批待处理作业
    ///
    /// 只有读取队列失败才返回错误；单个作业的错误记录在结果中。
    pub async fn run_batch(&self) -> Result<BatchSummary> {
        let _guard = self.batch_lock.lock().await;

        info!("📥 正在读取待处理作业...");
        let jobs = self
            .store
            .fetch_pending(self.settings.batch_size, self.settings.max_retry_count)
            .await
            .context("读取待处理作业失败")?;

        if jobs.is_empty() {
            info!("没有待处理的作业");
            return Ok(BatchSummary::from_results(Vec::new()));
        }

        let batch_id = self.batch_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let total = jobs.len();
        log_batch_start(batch_id, total);

        let mut results = Vec::with_capacity(total);
        for (idx, job) in jobs.iter().enumerate() {
            let ctx = SubmissionCtx::new(job, batch_id, idx + 1);
            info!("{} ({}/{}) 目录: {}", ctx, idx + 1, total, ctx.directory_name);

            let outcome = match self.flow.run(job, &ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{} ❌ 处理失败: {:#}", ctx, e);
                    JobOutcome::errored(&ctx, &e)
                }
            };
            results.push(outcome);

            // 最后一个作业之后不再停顿
            if idx + 1 < total {
                let (min, max) = self.settings.inter_job_delay_ms;
                human_delay(min, max).await;
            }
        }

        let summary = BatchSummary::from_results(results);
        log_batch_complete(batch_id, summary.succeeded, summary.failed, total);
        Ok(summary)
    }
}
