//! 通用适配器
//!
//! 三条填表路径，按顺序尝试：
//! 1. 目录配置了 `adapter_config.form_fields`：按映射填写
//! 2. 否则按字段模式自动识别，每个字段取第一个可见命中
//! 3. 自动识别一个都没填上时，交给 AI 识别兜底
//!
//! 填完后寻找提交按钮（找不到则按回车），再用关键词扫描结果页。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use super::base::{
    check_success, field_value, fill_field, find_by_texts, human_delay, open, page_snapshot,
    submit_form, wait_after_submit,
};
use super::{SubmissionAdapter, SubmissionInput, SubmissionResult};
use crate::infrastructure::PageDriver;
use crate::models::website::non_empty;
use crate::models::AdapterConfig;
use crate::services::form_detection::{fill_with_detected, FieldDetector};

/// 自动识别和 AI 兜底都没填上字段时的错误
pub const NO_FIELDS_ERROR: &str = "Could not auto-detect any form fields";

/// 配置映射路径未能确认成功
const CONFIGURED_UNCONFIRMED: &str = "Could not confirm submission";

/// 自动识别路径未能确认成功
const AUTO_UNCONFIRMED: &str = "Auto-detection may have failed";

/// 提交按钮的候选选择器（按文本匹配的按钮插在中间）
const SUBMIT_SELECTORS_BEFORE_TEXT: &[&str] = &["button[type=\"submit\"]", "input[type=\"submit\"]"];
const SUBMIT_BUTTON_TEXTS: &[&str] = &["Submit", "Add", "Create", "Post", "Send"];
const SUBMIT_SELECTORS_AFTER_TEXT: &[&str] = &[".submit-button", ".btn-submit", "#submit", "[data-submit]"];

/// 一个语义字段的候选名称和要填入的值
struct FieldPattern {
    names: &'static [&'static str],
    value: Option<String>,
}

/// 某个字段名的候选选择器（顺序即优先级）
pub fn candidate_selectors(name: &str) -> [String; 10] {
    [
        format!("input[name=\"{}\"]", name),
        format!("input[name*=\"{}\"]", name),
        format!("input[id=\"{}\"]", name),
        format!("input[id*=\"{}\"]", name),
        format!("textarea[name=\"{}\"]", name),
        format!("textarea[name*=\"{}\"]", name),
        format!("textarea[id=\"{}\"]", name),
        format!("textarea[id*=\"{}\"]", name),
        format!("input[placeholder*=\"{}\" i]", name),
        format!("textarea[placeholder*=\"{}\" i]", name),
    ]
}

/// 通用适配器
pub struct GenericAdapter {
    detector: Arc<dyn FieldDetector>,
}

impl GenericAdapter {
    pub fn new(detector: Arc<dyn FieldDetector>) -> Self {
        Self { detector }
    }

    /// 按目录配置的字段映射填写
    async fn fill_configured_form(
        &self,
        page: &dyn PageDriver,
        input: &SubmissionInput<'_>,
        config: &AdapterConfig,
    ) -> Result<SubmissionResult> {
        info!("  -> 使用配置的字段映射");

        for (field, selector) in config.fill_fields() {
            let Some(value) = field_value(field, input.website, input.content) else {
                debug!("    跳过 {}: 没有对应的数据", field);
                continue;
            };
            debug!("    填写 {}", field);
            fill_field(page, selector, &value, false).await;
        }

        let submit = config.submit_selector().unwrap_or("button[type=\"submit\"]");
        info!("  -> 提交表单");
        submit_form(page, submit).await;
        human_delay(2000, 3000).await;

        let (url, content) = page_snapshot(page).await?;
        let success = check_success(&url, &content);
        Ok(SubmissionResult::verdict(success, url, CONFIGURED_UNCONFIRMED))
    }

    /// 自动识别字段并填写
    async fn auto_fill_form(
        &self,
        page: &dyn PageDriver,
        input: &SubmissionInput<'_>,
    ) -> Result<SubmissionResult> {
        info!("  -> 自动识别表单字段");

        let mut filled = auto_fill(page, input).await;
        let mut ai_submit = None;

        if filled == 0 {
            info!("  -> 规则匹配没有命中，尝试 AI 识别...");
            match self.detector.detect(page, input.website).await {
                Ok(detected) => {
                    filled = fill_with_detected(page, &detected, input.website, input.content).await;
                    if filled > 0 {
                        info!("  -> AI 成功填写 {} 个字段", filled);
                    }
                    ai_submit = detected.submit;
                    if filled == 0 {
                        return Ok(SubmissionResult::failed(NO_FIELDS_ERROR));
                    }
                }
                Err(e) => {
                    info!("  -> AI 识别失败: {}", e);
                    return Ok(SubmissionResult::failed(e.to_string()));
                }
            }
        }

        if !click_submit(page, ai_submit.as_deref()).await {
            debug!("  -> 没有找到提交按钮，按回车提交");
            if let Err(e) = page.press_enter().await {
                debug!("    按回车失败: {}", e);
            }
            human_delay(2000, 3000).await;
        }
        human_delay(2000, 3000).await;

        let (url, content) = page_snapshot(page).await?;
        let success = check_success(&url, &content);
        Ok(SubmissionResult::verdict(success, url, AUTO_UNCONFIRMED))
    }
}

/// 按字段模式自动填写，返回填写成功的字段数
///
/// 每个字段在第一个"存在且可见"的候选选择器上填写后即停止。
async fn auto_fill(page: &dyn PageDriver, input: &SubmissionInput<'_>) -> usize {
    let website = input.website;
    let content = input.content;

    let patterns = [
        FieldPattern {
            names: &["name", "title", "startup_name", "company", "product", "app"],
            value: Some(website.name.clone()).filter(|s| !s.is_empty()),
        },
        FieldPattern {
            names: &["url", "website", "site", "link", "homepage"],
            value: Some(website.url.clone()).filter(|s| !s.is_empty()),
        },
        FieldPattern {
            names: &["email", "contact_email", "contact"],
            value: website.email().map(str::to_string),
        },
        FieldPattern {
            names: &["tagline", "slogan", "subtitle", "short"],
            value: non_empty(&content.tagline)
                .or_else(|| non_empty(&website.tagline))
                .map(str::to_string),
        },
        FieldPattern {
            names: &["description", "about", "summary", "details", "bio"],
            value: non_empty(&content.short_description)
                .or_else(|| non_empty(&website.description_short))
                .map(str::to_string),
        },
        FieldPattern {
            names: &["twitter"],
            value: non_empty(&website.twitter_url).map(str::to_string),
        },
        FieldPattern {
            names: &["linkedin"],
            value: non_empty(&website.linkedin_url).map(str::to_string),
        },
        FieldPattern {
            names: &["github"],
            value: non_empty(&website.github_url).map(str::to_string),
        },
    ];

    let mut filled = 0;
    for pattern in &patterns {
        let Some(value) = &pattern.value else {
            continue;
        };

        'names: for name in pattern.names {
            for selector in candidate_selectors(name) {
                if !page.exists(&selector).await.unwrap_or(false) {
                    continue;
                }
                if !page.is_visible(&selector).await.unwrap_or(false) {
                    continue;
                }
                if fill_field(page, &selector, value, true).await {
                    info!("  -> 自动填写: {}", name);
                    filled += 1;
                    break 'names;
                }
            }
        }
    }

    filled
}

/// 依次尝试提交按钮候选，点击第一个存在的，返回是否点击
async fn click_submit(page: &dyn PageDriver, preferred: Option<&str>) -> bool {
    let mut selector = None;

    if let Some(preferred) = preferred {
        if page.exists(preferred).await.unwrap_or(false) {
            selector = Some(preferred.to_string());
        }
    }
    if selector.is_none() {
        selector = first_existing(page, SUBMIT_SELECTORS_BEFORE_TEXT).await;
    }
    if selector.is_none() {
        selector = find_by_texts(page, "button", SUBMIT_BUTTON_TEXTS).await;
    }
    if selector.is_none() {
        selector = first_existing(page, SUBMIT_SELECTORS_AFTER_TEXT).await;
    }

    let Some(selector) = selector else {
        return false;
    };
    debug!("  -> 点击提交按钮: {}", selector);
    if page.click(&selector).await.is_err() {
        return false;
    }
    wait_after_submit(page).await;
    true
}

async fn first_existing(page: &dyn PageDriver, selectors: &[&str]) -> Option<String> {
    for selector in selectors {
        if page.exists(selector).await.unwrap_or(false) {
            return Some(selector.to_string());
        }
    }
    None
}

#[async_trait]
impl SubmissionAdapter for GenericAdapter {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn submit(
        &self,
        page: &dyn PageDriver,
        input: &SubmissionInput<'_>,
    ) -> Result<SubmissionResult> {
        let target = input.directory.target_url();
        info!("  -> 打开提交页面 {}", target);
        open(page, target, (1000, 2000)).await?;

        match input.directory.adapter_config.as_ref() {
            Some(config) if config.has_form_fields() => {
                self.fill_configured_form(page, input, config).await
            }
            _ => self.auto_fill_form(page, input).await,
        }
    }
}
