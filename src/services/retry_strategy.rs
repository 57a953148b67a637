//! 重试策略 - 业务能力层
//!
//! 纯函数：根据错误类别与两个计数器给出重试决策，不做任何 I/O。
//!
//! | 类别 | 最大次数 | 退避（分钟） | 计数器 |
//! |---|---|---|---|
//! | transient | 3 | 2, 10, 30 | retry_count |
//! | rate_limited | 3 | 30, 120, 480 | retry_count |
//! | infrastructure | 2 | 0, 1 | infrastructure_retries |
//! | permanent | 0 | - | 终态 failed |
//! | configuration | 0 | - | 终态 needs_review |

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{ErrorCategory, SubmissionStatus};

/// 退避表越界时使用的默认延迟
pub const DEFAULT_DELAY_MINUTES: u32 = 60;

struct RetryPolicy {
    max_retries: u32,
    backoff_minutes: &'static [u32],
    final_status: SubmissionStatus,
}

fn policy(category: ErrorCategory) -> RetryPolicy {
    match category {
        ErrorCategory::Transient => RetryPolicy {
            max_retries: 3,
            backoff_minutes: &[2, 10, 30],
            final_status: SubmissionStatus::Failed,
        },
        ErrorCategory::RateLimited => RetryPolicy {
            max_retries: 3,
            backoff_minutes: &[30, 120, 480],
            final_status: SubmissionStatus::Failed,
        },
        ErrorCategory::Infrastructure => RetryPolicy {
            max_retries: 2,
            backoff_minutes: &[0, 1],
            final_status: SubmissionStatus::Failed,
        },
        ErrorCategory::Permanent => RetryPolicy {
            max_retries: 0,
            backoff_minutes: &[],
            final_status: SubmissionStatus::Failed,
        },
        ErrorCategory::Configuration => RetryPolicy {
            max_retries: 0,
            backoff_minutes: &[],
            final_status: SubmissionStatus::NeedsReview,
        },
    }
}

/// 重试决策
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub immediate: bool,
    pub delay_minutes: u32,
    pub requires_browser_restart: bool,
    pub increments_retry_count: bool,
    pub increments_infra_count: bool,
    /// 不再重试时的终态
    pub terminal_status: Option<SubmissionStatus>,
    /// 不再重试的原因
    pub reason: Option<&'static str>,
}

impl RetryDecision {
    fn stop(status: SubmissionStatus, reason: &'static str) -> Self {
        Self {
            should_retry: false,
            immediate: false,
            delay_minutes: 0,
            requires_browser_restart: false,
            increments_retry_count: false,
            increments_infra_count: false,
            terminal_status: Some(status),
            reason: Some(reason),
        }
    }
}

/// 根据类别和计数器给出重试决策
pub fn decide(category: ErrorCategory, retry_count: u32, infra_retries: u32) -> RetryDecision {
    let policy = policy(category);

    // 基础设施错误使用独立计数器
    if category == ErrorCategory::Infrastructure {
        if infra_retries >= policy.max_retries {
            return RetryDecision::stop(
                policy.final_status,
                "Max infrastructure retries exceeded",
            );
        }
        let delay_minutes = policy
            .backoff_minutes
            .get(infra_retries as usize)
            .copied()
            .unwrap_or(0);
        return RetryDecision {
            should_retry: true,
            immediate: delay_minutes == 0,
            delay_minutes,
            requires_browser_restart: true,
            increments_retry_count: false,
            increments_infra_count: true,
            terminal_status: None,
            reason: None,
        };
    }

    if retry_count >= policy.max_retries {
        let reason = if policy.max_retries == 0 {
            "Error type does not support retry"
        } else {
            "Max retries exceeded"
        };
        return RetryDecision::stop(policy.final_status, reason);
    }

    let delay_minutes = policy
        .backoff_minutes
        .get(retry_count as usize)
        .copied()
        .unwrap_or(DEFAULT_DELAY_MINUTES);

    RetryDecision {
        should_retry: true,
        immediate: false,
        delay_minutes,
        requires_browser_restart: false,
        increments_retry_count: true,
        increments_infra_count: false,
        terminal_status: None,
        reason: None,
    }
}

/// 计算下次可重试时间
pub fn next_retry_at(delay_minutes: u32) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(i64::from(delay_minutes))
}

/// 面向用户的重试说明
pub fn retry_message(decision: &RetryDecision, category: ErrorCategory) -> String {
    if !decision.should_retry {
        return match category {
            ErrorCategory::Permanent => "This error requires manual intervention. Please submit directly on the directory website.",
            ErrorCategory::Configuration => "This directory needs a custom adapter configuration to work reliably.",
            _ => "Maximum retries reached. Please try again later.",
        }
        .to_string();
    }

    if decision.immediate {
        return "Retrying immediately after system recovery...".to_string();
    }

    if decision.delay_minutes >= 60 {
        let hours = (f64::from(decision.delay_minutes) / 60.0).round() as u32;
        return format!("Will retry in {} hour{}", hours, if hours > 1 { "s" } else { "" });
    }

    format!(
        "Will retry in {} minute{}",
        decision.delay_minutes,
        if decision.delay_minutes > 1 { "s" } else { "" }
    )
}
