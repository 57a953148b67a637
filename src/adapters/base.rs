//! 适配器共享能力
//!
//! 所有适配器复用的自由函数：拟人延时、填字段、下拉选择、点击、提交、
//! 登录检查、字段取值表和结果页关键词判定。

use std::sync::LazyLock;
use std::time::Duration;

use phf::phf_map;
use rand::Rng;
use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::infrastructure::PageDriver;
use crate::models::website::non_empty;
use crate::models::{SubmissionContent, Website};

/// 等待元素出现的上限
pub const ELEMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// 页面导航上限
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// 结果页的成功关键词
const SUCCESS_TERMS: &[&str] = &[
    "thank",
    "success",
    "confirm",
    "submitted",
    "received",
    "pending",
    "review",
    "approved",
    "complete",
];

/// 结果页的失败关键词
const FAILURE_TERMS: &[&str] = &["error", "failed", "invalid", "required", "missing"];

/// 随机停顿 `min_ms..=max_ms` 毫秒
pub async fn human_delay(min_ms: u64, max_ms: u64) {
    let ms = if max_ms > min_ms {
        rand::thread_rng().gen_range(min_ms..=max_ms)
    } else {
        min_ms
    };
    sleep(Duration::from_millis(ms)).await;
}

/// 拟人化填写一个字段，返回是否填写成功
///
/// 等待元素 → (可选)清空 → 点击 → 停顿 → 逐字输入 → 停顿
pub async fn fill_field(page: &dyn PageDriver, selector: &str, value: &str, clear: bool) -> bool {
    if value.is_empty() || selector.is_empty() {
        return false;
    }

    let result = async {
        page.wait_for_selector(selector, ELEMENT_TIMEOUT).await?;
        if clear {
            page.clear(selector).await?;
        }
        page.click(selector).await?;
        human_delay(100, 300).await;
        page.type_text(selector, value, (30, 80)).await?;
        human_delay(100, 400).await;
        Ok::<(), anyhow::Error>(())
    }
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("    字段未找到: {} ({})", selector, e);
            false
        }
    }
}

/// 选择下拉框选项
pub async fn select_option(page: &dyn PageDriver, selector: &str, value: &str) -> bool {
    let result = async {
        page.wait_for_selector(selector, ELEMENT_TIMEOUT).await?;
        page.select_option(selector, value).await
    }
    .await;

    match result {
        Ok(selected) => {
            if selected {
                human_delay(100, 400).await;
            } else {
                debug!("    下拉框没有匹配的选项: {} = {}", selector, value);
            }
            selected
        }
        Err(e) => {
            warn!("    下拉框未找到: {} ({})", selector, e);
            false
        }
    }
}

/// 等待并点击按钮
pub async fn click_button(page: &dyn PageDriver, selector: &str) -> bool {
    let result = async {
        page.wait_for_selector(selector, ELEMENT_TIMEOUT).await?;
        page.click(selector).await
    }
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("    按钮未找到: {} ({})", selector, e);
            false
        }
    }
}

/// 在 `scope` 命中的元素中按文本查找，返回第一个匹配元素的选择器
pub async fn find_by_texts(page: &dyn PageDriver, scope: &str, texts: &[&str]) -> Option<String> {
    for text in texts {
        match page.find_by_text(scope, text).await {
            Ok(Some(selector)) => return Some(selector),
            Ok(None) => {}
            Err(e) => debug!("    按文本查找失败 ({}): {}", text, e),
        }
    }
    None
}

/// 点击文本匹配的第一个元素
pub async fn click_by_text(page: &dyn PageDriver, scope: &str, texts: &[&str]) -> bool {
    let Some(selector) = find_by_texts(page, scope, texts).await else {
        return false;
    };
    match page.click(&selector).await {
        Ok(()) => true,
        Err(e) => {
            debug!("    点击失败: {}", e);
            false
        }
    }
}

/// 点击提交并等待页面稳定（导航完成或固定超时，先到为准）
pub async fn submit_form(page: &dyn PageDriver, selector: &str) {
    click_button(page, selector).await;
    wait_after_submit(page).await;
}

/// 提交后的等待：导航最多 15s，固定等待 10s，先到为准
pub async fn wait_after_submit(page: &dyn PageDriver) {
    tokio::select! {
        result = page.wait_for_navigation(Duration::from_secs(15)) => {
            if let Err(e) = result {
                debug!("    等待导航失败: {}", e);
            }
        }
        _ = sleep(Duration::from_secs(10)) => {}
    }
}

/// 导航并停顿
pub async fn open(page: &dyn PageDriver, url: &str, settle: (u64, u64)) -> anyhow::Result<()> {
    debug!("  -> 打开 {}", url);
    page.goto(url, NAVIGATION_TIMEOUT).await?;
    human_delay(settle.0, settle.1).await;
    Ok(())
}

/// 当前地址和页面内容
pub async fn page_snapshot(page: &dyn PageDriver) -> anyhow::Result<(String, String)> {
    let url = page.url().await?;
    let content = page.content().await?;
    Ok((url, content))
}

/// 登录检查：有表单则已登录；没有表单但有登录入口则需要登录
pub async fn needs_login(
    page: &dyn PageDriver,
    form_selector: &str,
    login_selector: &str,
    login_texts: &[&str],
) -> bool {
    if page.exists(form_selector).await.unwrap_or(false) {
        return false;
    }
    if page.exists(login_selector).await.unwrap_or(false) {
        return true;
    }
    find_by_texts(page, "a, button", login_texts).await.is_some()
}

/// 勾选服务条款复选框（如果存在且未勾选）
pub async fn accept_terms(page: &dyn PageDriver, selector: &str) {
    if !page.exists(selector).await.unwrap_or(false) {
        return;
    }
    if page.is_checked(selector).await.unwrap_or(false) {
        return;
    }
    match page.click(selector).await {
        Ok(()) => human_delay(100, 400).await,
        Err(e) => debug!("    勾选条款失败: {}", e),
    }
}

/// 结果页关键词判定
///
/// 出现失败词时，只有同时出现成功词才算成功（有些确认页两者都有）。
pub fn check_success(url: &str, content: &str) -> bool {
    let haystack = format!("{} {}", url, content).to_lowercase();
    let has_success = SUCCESS_TERMS.iter().any(|w| haystack.contains(w));
    let has_failure = FAILURE_TERMS.iter().any(|w| haystack.contains(w));

    if has_failure {
        return has_success;
    }
    has_success
}

/// 任一短语出现在 url + 内容中
pub fn contains_any(url: &str, content: &str, phrases: &[&str]) -> bool {
    let haystack = format!("{} {}", url, content).to_lowercase();
    phrases.iter().any(|p| haystack.contains(p))
}

/// 按字符截断
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// 字段名对应的业务数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldSource {
    Name,
    Url,
    Email,
    Tagline,
    Description,
    ShortDescription,
    LongDescription,
    About,
    Summary,
    Twitter,
    Linkedin,
    Github,
    Industry,
    Category,
    Founder,
    FounderEmail,
}

static FIELD_SOURCES: phf::Map<&'static str, FieldSource> = phf_map! {
    "name" => FieldSource::Name,
    "title" => FieldSource::Name,
    "startup_name" => FieldSource::Name,
    "company" => FieldSource::Name,
    "company_name" => FieldSource::Name,
    "product_name" => FieldSource::Name,

    "url" => FieldSource::Url,
    "website" => FieldSource::Url,
    "site" => FieldSource::Url,
    "link" => FieldSource::Url,
    "homepage" => FieldSource::Url,
    "website_url" => FieldSource::Url,

    "email" => FieldSource::Email,
    "contact" => FieldSource::Email,
    "contact_email" => FieldSource::Email,

    "tagline" => FieldSource::Tagline,
    "slogan" => FieldSource::Tagline,
    "subtitle" => FieldSource::Tagline,
    "short_tagline" => FieldSource::Tagline,

    "description" => FieldSource::Description,
    "short_description" => FieldSource::ShortDescription,
    "long_description" => FieldSource::LongDescription,
    "about" => FieldSource::About,
    "summary" => FieldSource::Summary,

    "twitter" => FieldSource::Twitter,
    "twitter_url" => FieldSource::Twitter,
    "linkedin" => FieldSource::Linkedin,
    "linkedin_url" => FieldSource::Linkedin,
    "github" => FieldSource::Github,
    "github_url" => FieldSource::Github,

    "industry" => FieldSource::Industry,
    "category" => FieldSource::Category,

    "founder" => FieldSource::Founder,
    "founder_name" => FieldSource::Founder,
    "founder_email" => FieldSource::FounderEmail,
};

/// 按字段名（不区分大小写）查找要填写的值
pub fn field_value(field: &str, website: &Website, content: &SubmissionContent) -> Option<String> {
    let source = FIELD_SOURCES.get(field.to_lowercase().as_str())?;

    let value = match source {
        FieldSource::Name => Some(website.name.as_str()).filter(|s| !s.is_empty()),
        FieldSource::Url => Some(website.url.as_str()).filter(|s| !s.is_empty()),
        FieldSource::Email => website.email(),
        FieldSource::Tagline => {
            non_empty(&content.tagline).or_else(|| non_empty(&website.tagline))
        }
        FieldSource::Description => non_empty(&content.short_description)
            .or_else(|| non_empty(&content.long_description))
            .or_else(|| non_empty(&website.description_short))
            .or_else(|| non_empty(&website.description_medium)),
        FieldSource::ShortDescription | FieldSource::Summary => {
            non_empty(&content.short_description).or_else(|| non_empty(&website.description_short))
        }
        FieldSource::LongDescription => non_empty(&content.long_description)
            .or_else(|| non_empty(&website.description_medium))
            .or_else(|| non_empty(&website.description_long)),
        FieldSource::About => {
            non_empty(&content.long_description).or_else(|| non_empty(&website.description_medium))
        }
        FieldSource::Twitter => non_empty(&website.twitter_url),
        FieldSource::Linkedin => non_empty(&website.linkedin_url),
        FieldSource::Github => non_empty(&website.github_url),
        FieldSource::Industry => non_empty(&website.industry),
        FieldSource::Category => {
            non_empty(&website.category).or_else(|| non_empty(&website.industry))
        }
        FieldSource::Founder => non_empty(&website.founder_name),
        FieldSource::FounderEmail => non_empty(&website.founder_email),
    };

    value.map(str::to_string)
}

static TWITTER_HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:twitter\.com|x\.com)/([^/?]+)").unwrap());

/// 从 Twitter/X 链接中提取 `@handle`；本身是 handle 时补上 `@`
pub fn extract_twitter_handle(twitter_url: &str) -> Option<String> {
    let trimmed = twitter_url.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(caps) = TWITTER_HANDLE.captures(trimmed) {
        return Some(format!("@{}", &caps[1]));
    }
    if trimmed.starts_with('@') {
        return Some(trimmed.to_string());
    }
    Some(format!("@{}", trimmed))
}
