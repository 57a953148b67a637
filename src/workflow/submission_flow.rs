//! 作业处理流程 - 流程层
//!
//! 核心职责：定义"一个作业"的完整处理流程
//!
//! 流程顺序：
//! 1. 检查目录 / 网站记录 → 缺失则转人工
//! 2. 获取浏览器 → 失败按基础设施错误记录
//! 3. 认领作业（in_progress）并记录标题与描述
//! 4. 打开页面 → 适配器提交 → 关闭页面
//! 5. 成功写回 submitted；失败则分类 → 重试决策 → 写回

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::adapters::{AdapterRegistry, SubmissionInput, SubmissionResult};
use crate::browser::{BrowserManager, BrowserSession};
use crate::models::{
    Directory, ErrorCategory, Submission, SubmissionContent, SubmissionStatus, SubmissionUpdate,
    Website,
};
use crate::services::error_classifier::{
    category_description, classify, ClassificationContext, ErrorClassification,
};
use crate::services::retry_strategy::{self, RetryDecision};
use crate::store::SubmissionStore;
use crate::utils::truncate_text;
use crate::workflow::submission_ctx::SubmissionCtx;

/// 单个作业的处理结果（随批次汇总返回给调用方）
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub id: String,
    pub directory: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub will_retry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    /// 类别的说明文字，供运维查看
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_description: Option<&'static str>,
    /// 被其他 worker 抢先认领而跳过
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl JobOutcome {
    fn succeeded(ctx: &SubmissionCtx) -> Self {
        Self {
            id: ctx.job_id.clone(),
            directory: ctx.directory_name.clone(),
            success: true,
            error: None,
            will_retry: false,
            category: None,
            category_description: None,
            skipped: false,
        }
    }

    fn failed(
        ctx: &SubmissionCtx,
        error: impl Into<String>,
        will_retry: bool,
        category: Option<ErrorCategory>,
    ) -> Self {
        Self {
            id: ctx.job_id.clone(),
            directory: ctx.directory_name.clone(),
            success: false,
            error: Some(error.into()),
            will_retry,
            category,
            category_description: category.map(category_description),
            skipped: false,
        }
    }

    fn skipped(ctx: &SubmissionCtx) -> Self {
        Self {
            skipped: true,
            ..Self::failed(ctx, "Job already claimed by another worker", false, None)
        }
    }

    /// 处理流程自身出错（通常是写回失败）时的结果
    pub fn errored(ctx: &SubmissionCtx, error: &anyhow::Error) -> Self {
        Self::failed(ctx, format!("{:#}", error), false, None)
    }
}

/// 作业处理流程
///
/// - 编排一个作业的完整处理流程
/// - 浏览器只通过 [`BrowserManager`] 获取，页面用完即关
/// - 唯一写回作业状态、计数器和错误字段的地方
pub struct SubmissionFlow {
    store: Arc<dyn SubmissionStore>,
    browser: Arc<BrowserManager>,
    registry: Arc<AdapterRegistry>,
    user_agent: String,
    max_retry_count: u32,
}

impl SubmissionFlow {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        browser: Arc<BrowserManager>,
        registry: Arc<AdapterRegistry>,
        user_agent: impl Into<String>,
        max_retry_count: u32,
    ) -> Self {
        Self {
            store,
            browser,
            registry,
            user_agent: user_agent.into(),
            max_retry_count,
        }
    }

    pub async fn run(&self, job: &Submission, ctx: &SubmissionCtx) -> Result<JobOutcome> {
        // ========== 1. 检查关联记录 ==========
        let Some(directory) = job.directory.as_ref() else {
            return self.park_for_review(job, ctx, "Directory not found").await;
        };
        let Some(website) = job.website.as_ref() else {
            return self.park_for_review(job, ctx, "Website not found").await;
        };

        info!("{} 📝 开始处理: {} → {}", ctx, website.name, directory.name);

        // ========== 2. 获取浏览器 ==========
        let browser = match self.browser.ensure_browser().await {
            Ok(browser) => browser,
            Err(e) => {
                error!("{} ❌ 无法获取浏览器: {}", ctx, e);
                let message = format!("Browser unavailable: {}", e);
                let classification = ErrorClassification::infrastructure(&message);
                return self.record_failure(job, ctx, classification).await;
            }
        };

        // ========== 3. 认领作业 ==========
        let content = SubmissionContent::from_website(website);
        let claimed = self
            .store
            .claim(
                &job.id,
                Some(website.name.clone()),
                content.short_description.clone(),
            )
            .await
            .context("认领作业失败")?;
        if !claimed {
            warn!("{} ⚠️ 作业已被其他 worker 认领，跳过", ctx);
            return Ok(JobOutcome::skipped(ctx));
        }

        // ========== 4. 提交 ==========
        let attempt = self
            .attempt(browser.as_ref(), directory, website, &content, ctx)
            .await;

        // ========== 5. 写回结果 ==========
        let error_text = match attempt {
            Ok(result) if result.success => {
                return self.record_success(job, ctx, &result).await;
            }
            Ok(result) => {
                if result.needs_auth {
                    warn!(
                        "{} 🔒 需要登录: {}",
                        ctx,
                        result.login_url.as_deref().unwrap_or("-")
                    );
                }
                result.error_message()
            }
            Err(e) => format!("{:#}", e),
        };

        warn!("{} ❌ {}: {}", ctx, ctx.directory_name, truncate_text(&error_text, 200));
        let classification = classify(
            &error_text,
            &ClassificationContext {
                has_adapter_config: directory.has_adapter_config(),
                adapter_name: ctx.adapter_name.clone(),
            },
        );
        self.record_failure(job, ctx, classification).await
    }

    /// 打开页面，交给适配器提交，无论结果如何都关闭页面
    async fn attempt(
        &self,
        browser: &dyn BrowserSession,
        directory: &Directory,
        website: &Website,
        content: &SubmissionContent,
        ctx: &SubmissionCtx,
    ) -> Result<SubmissionResult> {
        let page = browser.new_page().await?;
        page.prepare(&self.user_agent).await?;

        let adapter = self.registry.get(directory.adapter_name.as_deref());
        info!("{} 🔧 使用适配器: {}", ctx, adapter.name());

        let input = SubmissionInput {
            website,
            directory,
            content,
        };
        let result = adapter.submit(page.as_ref(), &input).await;

        if let Err(e) = page.close().await {
            debug!("{} 关闭页面失败: {}", ctx, e);
        }
        result
    }

    async fn record_success(
        &self,
        job: &Submission,
        ctx: &SubmissionCtx,
        result: &SubmissionResult,
    ) -> Result<JobOutcome> {
        let listing_url = result.listing_url();
        self.store
            .update(&job.id, &SubmissionUpdate::submitted(listing_url.clone()))
            .await
            .context("写回提交成功状态失败")?;

        info!(
            "{} ✅ {}: 提交成功 {}",
            ctx,
            ctx.directory_name,
            listing_url.as_deref().unwrap_or("")
        );
        Ok(JobOutcome::succeeded(ctx))
    }

    /// 目录或网站记录缺失：转人工处理
    async fn park_for_review(
        &self,
        job: &Submission,
        ctx: &SubmissionCtx,
        reason: &str,
    ) -> Result<JobOutcome> {
        warn!("{} ⚠️ {}，转人工处理", ctx, reason);
        let update = SubmissionUpdate {
            status: Some(SubmissionStatus::NeedsReview),
            error_message: Some(Some(reason.to_string())),
            error_category: Some(Some(ErrorCategory::Configuration)),
            next_retry_at: Some(None),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        self.store
            .update(&job.id, &update)
            .await
            .context("写回作业状态失败")?;
        Ok(JobOutcome::failed(
            ctx,
            reason,
            false,
            Some(ErrorCategory::Configuration),
        ))
    }

    /// 按分类和重试决策写回失败
    async fn record_failure(
        &self,
        job: &Submission,
        ctx: &SubmissionCtx,
        classification: ErrorClassification,
    ) -> Result<JobOutcome> {
        let category = classification.category;
        let message = classification.original_error.clone();

        // 明确的"已提交 / 已存在"按成功处理
        if classification.mark_as_submitted {
            info!("{} ✅ 目录提示已提交过，按成功处理", ctx);
            let update = SubmissionUpdate {
                error_message: Some(Some(message)),
                ..SubmissionUpdate::submitted(None)
            };
            self.store
                .update(&job.id, &update)
                .await
                .context("写回作业状态失败")?;
            return Ok(JobOutcome::succeeded(ctx));
        }

        let decision = self.apply_ceiling(
            retry_strategy::decide(category, job.retry_count, job.infrastructure_retries),
            job,
        );
        let explanation = retry_strategy::retry_message(&decision, category);

        if classification.requires_browser_restart || decision.requires_browser_restart {
            info!("{} 🔄 错误需要重启浏览器，先清理", ctx);
            self.browser.cleanup().await;
        }

        let update = failure_update(job, &decision, &message, category, &explanation);
        self.store
            .update(&job.id, &update)
            .await
            .context("写回作业状态失败")?;

        if decision.should_retry {
            info!("{} 🔁 [{}] {}", ctx, category, explanation);
        } else {
            warn!(
                "{} 🛑 [{}] {} ({})",
                ctx,
                category,
                explanation,
                decision.reason.unwrap_or("-")
            );
        }

        Ok(JobOutcome::failed(
            ctx,
            message,
            decision.should_retry,
            Some(category),
        ))
    }

    /// 普通重试会让 retry_count 达到读取上限时，直接转为失败，
    /// 否则作业会停在一个永远不会被读取的 pending 状态
    fn apply_ceiling(&self, decision: RetryDecision, job: &Submission) -> RetryDecision {
        if decision.should_retry
            && decision.increments_retry_count
            && job.retry_count + 1 >= self.max_retry_count
        {
            return RetryDecision {
                should_retry: false,
                immediate: false,
                delay_minutes: 0,
                terminal_status: Some(SubmissionStatus::Failed),
                reason: Some("Max retries exceeded"),
                ..decision
            };
        }
        decision
    }
}

/// 失败时的写回内容
fn failure_update(
    job: &Submission,
    decision: &RetryDecision,
    message: &str,
    category: ErrorCategory,
    explanation: &str,
) -> SubmissionUpdate {
    let status = if decision.should_retry {
        SubmissionStatus::Pending
    } else {
        decision.terminal_status.unwrap_or(SubmissionStatus::Failed)
    };

    let error_message = if decision.should_retry {
        message.to_string()
    } else {
        format!("{} ({})", message, explanation)
    };

    SubmissionUpdate {
        status: Some(status),
        retry_count: decision
            .increments_retry_count
            .then_some(job.retry_count + 1),
        infrastructure_retries: decision
            .increments_infra_count
            .then_some(job.infrastructure_retries + 1),
        next_retry_at: Some(
            decision
                .should_retry
                .then(|| retry_strategy::next_retry_at(decision.delay_minutes)),
        ),
        error_message: Some(Some(error_message)),
        error_category: Some(Some(category)),
        updated_at: Some(Utc::now()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(retry_count: u32, infrastructure_retries: u32) -> Submission {
        Submission {
            id: "j1".into(),
            retry_count,
            infrastructure_retries,
            ..Default::default()
        }
    }

    #[test]
    fn infrastructure_failure_only_bumps_its_own_counter() {
        let job = job(1, 0);
        let decision = retry_strategy::decide(ErrorCategory::Infrastructure, 1, 0);
        let update = failure_update(&job, &decision, "Target closed", ErrorCategory::Infrastructure, "x");

        assert_eq!(update.status, Some(SubmissionStatus::Pending));
        assert_eq!(update.retry_count, None);
        assert_eq!(update.infrastructure_retries, Some(1));
        let next = update.next_retry_at.flatten().unwrap();
        assert!((next - Utc::now()).num_seconds().abs() < 5);
        assert_eq!(update.error_message, Some(Some("Target closed".to_string())));
    }

    #[test]
    fn terminal_failure_carries_explanation_and_clears_backoff() {
        let job = job(0, 0);
        let decision = retry_strategy::decide(ErrorCategory::Configuration, 0, 0);
        let update = failure_update(
            &job,
            &decision,
            "Could not auto-detect any form fields",
            ErrorCategory::Configuration,
            "needs setup",
        );

        assert_eq!(update.status, Some(SubmissionStatus::NeedsReview));
        assert_eq!(update.next_retry_at, Some(None));
        assert_eq!(
            update.error_message,
            Some(Some(
                "Could not auto-detect any form fields (needs setup)".to_string()
            ))
        );
        assert_eq!(update.error_category, Some(Some(ErrorCategory::Configuration)));
    }
}
