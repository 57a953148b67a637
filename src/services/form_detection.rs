//! AI 表单识别 - 业务能力层
//!
//! 规则匹配一个字段都没填上时的兜底：把表单 HTML 交给 LLM，
//! 让它返回"语义字段 → CSS 选择器"的 JSON，再按选择器填写。

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::llm_service::LlmService;
use crate::config::Config;
use crate::error::DetectionError;
use crate::infrastructure::PageDriver;
use crate::models::website::non_empty;
use crate::models::{SubmissionContent, Website};

/// 表单 HTML 的字符上限
pub const FORM_HTML_LIMIT: usize = 15_000;

/// 少于这个长度的 HTML 视为没有表单
const MIN_FORM_HTML: usize = 50;

/// AI 识别出的选择器
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedFields {
    /// 语义字段名 → 选择器（不含 submit）
    pub fields: BTreeMap<String, String>,
    pub submit: Option<String>,
}

/// 表单字段识别能力
#[async_trait]
pub trait FieldDetector: Send + Sync {
    async fn detect(
        &self,
        page: &dyn PageDriver,
        website: &Website,
    ) -> Result<DetectedFields, DetectionError>;
}

/// 基于 LLM 的字段识别
pub struct LlmFormDetector {
    llm: Option<LlmService>,
}

impl LlmFormDetector {
    pub fn new(llm: LlmService) -> Self {
        Self { llm: Some(llm) }
    }

    /// 没有 API Key 时的识别器：每次都返回 "AI detection unavailable"
    pub fn unavailable() -> Self {
        Self { llm: None }
    }

    pub fn from_config(config: &Config) -> Self {
        match config.llm_api_key.as_deref() {
            Some(key) => Self::new(LlmService::new(
                key,
                &config.llm_api_base_url,
                &config.llm_model_name,
            )),
            None => Self::unavailable(),
        }
    }
}

#[async_trait]
impl FieldDetector for LlmFormDetector {
    async fn detect(
        &self,
        page: &dyn PageDriver,
        website: &Website,
    ) -> Result<DetectedFields, DetectionError> {
        let Some(llm) = &self.llm else {
            return Err(DetectionError::Unavailable);
        };

        let html = page
            .form_html(FORM_HTML_LIMIT)
            .await
            .map_err(|e| DetectionError::Api(format!("{:#}", e)))?;
        if html.chars().count() < MIN_FORM_HTML {
            return Err(DetectionError::NoFormElements);
        }

        let prompt = build_prompt(website, &html);
        let response = llm.send_to_llm(&prompt, None).await.map_err(|e| {
            warn!("AI 识别调用失败: {:#}", e);
            DetectionError::Api(format!("{:#}", e))
        })?;

        let detected = parse_detection(&response)?;
        info!(
            "  -> AI 识别出 {} 个字段: {}",
            detected.fields.len(),
            detected
                .fields
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(detected)
    }
}

/// 构建识别提示词
pub fn build_prompt(website: &Website, form_html: &str) -> String {
    format!(
        r#"Analyze this HTML form and return CSS selectors for filling a website/startup submission form.

Website to submit:
- Name: {name}
- URL: {url}
- Email: {email}
- Tagline: {tagline}
- Description: {description}

Form HTML:
{form_html}

Return ONLY a JSON object mapping field types to their CSS selectors. Only include fields you actually find in the HTML:
{{
  "name": "input#company-name",
  "url": "input[name='website']",
  "email": "input[type='email']",
  "tagline": "input[name='tagline']",
  "description": "textarea.description",
  "submit": "button[type='submit']"
}}

Rules:
- Use the most specific CSS selector possible (prefer id > name > class > type)
- Only include fields that actually exist in the HTML above
- Map common variations: "company", "startup", "product" → name; "website", "link", "homepage" → url
- For submit, find the submit button or input[type='submit']
- Return empty object {{}} if no matching fields found
- Do NOT include any explanation, only the JSON object"#,
        name = website.name,
        url = website.url,
        email = website.email().unwrap_or(""),
        tagline = non_empty(&website.tagline).unwrap_or(""),
        description = non_empty(&website.description_short).unwrap_or(""),
    )
}

/// 从自由文本中取出第一个 `{` 到最后一个 `}` 之间的内容
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 解析 LLM 响应
pub fn parse_detection(response: &str) -> Result<DetectedFields, DetectionError> {
    let Some(json) = extract_json_object(response) else {
        debug!("  -> AI 返回了非 JSON 内容");
        return Err(DetectionError::InvalidFormat);
    };

    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|_| DetectionError::InvalidFormat)?;

    let mut detected = DetectedFields::default();
    for (key, value) in map {
        let Some(selector) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        if key == "submit" {
            detected.submit = Some(selector.to_string());
        } else {
            detected.fields.insert(key, selector.to_string());
        }
    }

    if detected.fields.is_empty() {
        return Err(DetectionError::NoFields);
    }
    Ok(detected)
}

/// AI 字段对应的填写值
fn detected_value(field: &str, website: &Website, content: &SubmissionContent) -> Option<String> {
    let value = match field {
        "name" => Some(website.name.as_str()).filter(|s| !s.is_empty()),
        "url" => Some(website.url.as_str()).filter(|s| !s.is_empty()),
        "email" => website.email(),
        "tagline" => non_empty(&website.tagline),
        "description" => non_empty(&content.long_description)
            .or_else(|| non_empty(&content.short_description))
            .or_else(|| non_empty(&website.description_short))
            .or_else(|| non_empty(&website.tagline)),
        _ => None,
    };
    value.map(str::to_string)
}

/// 按 AI 给出的选择器填写，返回成功填写的字段数
pub async fn fill_with_detected(
    page: &dyn PageDriver,
    detected: &DetectedFields,
    website: &Website,
    content: &SubmissionContent,
) -> usize {
    let mut filled = 0;

    for (field, selector) in &detected.fields {
        let Some(value) = detected_value(field, website, content) else {
            debug!("    跳过 {}: 没有可用的值", field);
            continue;
        };

        match page.exists(selector).await {
            Ok(true) => {}
            _ => {
                debug!("    AI 选择器未命中: {}", selector);
                continue;
            }
        }

        // 可见性检查失败时按可见处理
        if !page.is_visible(selector).await.unwrap_or(true) {
            debug!("    AI 选择器不可见: {}", selector);
            continue;
        }

        let result = async {
            page.click(selector).await?;
            page.clear(selector).await?;
            page.type_text(selector, &value, (30, 30)).await
        }
        .await;

        match result {
            Ok(()) => {
                filled += 1;
                debug!("    AI 已填写 {}: {}", field, selector);
            }
            Err(e) => debug!("    AI 选择器填写失败 ({}): {}", field, e),
        }
    }

    filled
}
