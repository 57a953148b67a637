//! 错误分类器 - 业务能力层
//!
//! 把一条自由文本错误信息映射为五种类别之一，并给出派生标志：
//! - `infrastructure`：浏览器 / 控制协议故障，需要重启浏览器
//! - `transient`：超时、网络、元素未找到等，可重试
//! - `rate_limited`：被限流，长退避后重试
//! - `permanent`：验证码、禁止访问、重复提交、需要登录，不重试
//! - `configuration`：缺少适配器配置，需要人工处理
//!
//! 分类表按顺序匹配，先命中者生效；顺序决定了歧义文本归属哪个类别，不要随意调整。

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub use crate::models::ErrorCategory;

/// 分类表中的一行
struct ErrorPattern {
    pattern: Regex,
    category: ErrorCategory,
    adjust_timeout: bool,
    mark_as_submitted: bool,
}

fn entry(pattern: &str, category: ErrorCategory) -> ErrorPattern {
    ErrorPattern {
        pattern: Regex::new(&format!("(?i){}", pattern)).unwrap(),
        category,
        adjust_timeout: false,
        mark_as_submitted: false,
    }
}

fn timeout_entry(pattern: &str) -> ErrorPattern {
    ErrorPattern {
        adjust_timeout: true,
        ..entry(pattern, ErrorCategory::Transient)
    }
}

fn submitted_entry(pattern: &str) -> ErrorPattern {
    ErrorPattern {
        mark_as_submitted: true,
        ..entry(pattern, ErrorCategory::Permanent)
    }
}

static ERROR_PATTERNS: LazyLock<Vec<ErrorPattern>> = LazyLock::new(|| {
    use ErrorCategory::*;
    vec![
        // 基础设施：浏览器 / 连接
        entry(r"Protocol error", Infrastructure),
        entry(r"Connection closed", Infrastructure),
        entry(r"Target closed", Infrastructure),
        entry(r"Browser disconnected", Infrastructure),
        entry(r"Session closed", Infrastructure),
        entry(r"Execution context was destroyed", Infrastructure),
        entry(r"Browser crashed", Infrastructure),
        // 临时错误
        timeout_entry(r"Navigation timeout"),
        timeout_entry(r"Timeout exceeded"),
        entry(r"net::ERR_", Transient),
        entry(r"ECONNREFUSED", Transient),
        entry(r"ETIMEDOUT", Transient),
        entry(r"ENOTFOUND", Transient),
        entry(r"Element.*not found", Transient),
        entry(r"waiting for selector", Transient),
        entry(r"failed to find", Transient),
        // 限流
        entry(r"429", RateLimited),
        entry(r"Too Many Requests", RateLimited),
        entry(r"rate limit", RateLimited),
        entry(r"slow down", RateLimited),
        entry(r"throttl", RateLimited),
        // 永久错误
        entry(r"403.*Forbidden", Permanent),
        entry(r"CAPTCHA", Permanent),
        entry(r"reCAPTCHA", Permanent),
        entry(r"hCaptcha", Permanent),
        submitted_entry(r"already submitted"),
        submitted_entry(r"already exists"),
        entry(r"duplicate", Permanent),
        entry(r"account required", Permanent),
        entry(r"login required", Permanent),
        entry(r"must be logged in", Permanent),
        entry(r"access denied", Permanent),
        // 配置缺失
        entry(r"Could not auto-detect any form fields", Configuration),
        entry(r"adapter.*not found", Configuration),
        entry(r"no form fields configured", Configuration),
        // AI 识别
        entry(r"AI error:", Transient),
        entry(r"AI could not identify", Configuration),
        entry(r"AI returned invalid", Transient),
        entry(r"AI detection unavailable", Configuration),
    ]
});

static ALREADY_SUBMITTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)already (submitted|exists)").unwrap());

/// 分类时可用的提交上下文
#[derive(Debug, Clone, Default)]
pub struct ClassificationContext {
    /// 目录是否带有显式字段映射
    pub has_adapter_config: bool,
    /// 使用的适配器名称（仅用于日志）
    pub adapter_name: Option<String>,
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub is_retryable: bool,
    pub requires_browser_restart: bool,
    pub mark_as_submitted: bool,
    pub adjust_timeout: bool,
    pub original_error: String,
}

impl ErrorClassification {
    fn new(
        category: ErrorCategory,
        adjust_timeout: bool,
        mark_as_submitted: bool,
        message: &str,
    ) -> Self {
        Self {
            category,
            is_retryable: !matches!(
                category,
                ErrorCategory::Permanent | ErrorCategory::Configuration
            ),
            requires_browser_restart: category == ErrorCategory::Infrastructure,
            mark_as_submitted,
            adjust_timeout,
            original_error: message.to_string(),
        }
    }

    /// 浏览器获取失败时使用的强制基础设施分类
    pub fn infrastructure(message: &str) -> Self {
        Self::new(ErrorCategory::Infrastructure, false, false, message)
    }
}

/// 对错误信息进行分类
pub fn classify(message: &str, context: &ClassificationContext) -> ErrorClassification {
    // "already submitted / already exists" 无论与什么关键词同时出现，都视为已提交
    let already_submitted = ALREADY_SUBMITTED.is_match(message);

    if let Some(hit) = ERROR_PATTERNS.iter().find(|p| p.pattern.is_match(message)) {
        return ErrorClassification::new(
            hit.category,
            hit.adjust_timeout,
            hit.mark_as_submitted || already_submitted,
            message,
        );
    }

    if message.contains("Could not auto-detect") && !context.has_adapter_config {
        return ErrorClassification::new(ErrorCategory::Configuration, false, false, message);
    }

    // 未知错误按可恢复处理
    ErrorClassification::new(ErrorCategory::Transient, false, already_submitted, message)
}

/// 类别的人类可读说明
pub fn category_description(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Transient => "Temporary issue - will retry automatically",
        ErrorCategory::Permanent => "Permanent issue - requires manual intervention",
        ErrorCategory::Infrastructure => "System issue - recovering automatically",
        ErrorCategory::RateLimited => "Rate limited - will retry with longer delay",
        ErrorCategory::Configuration => "Missing configuration - needs adapter setup",
    }
}

/// 错误是否意味着浏览器需要重启
pub fn is_browser_crash(message: &str) -> bool {
    classify(message, &ClassificationContext::default()).requires_browser_restart
}
