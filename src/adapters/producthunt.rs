//! Product Hunt 适配器（https://www.producthunt.com/posts/new，需要登录）
//!
//! 多步向导：基本信息 → 媒体 → 描述/话题/定价 → 发布配置 → 最终提交。
//! 媒体上传和发布时间只做最基本的处理，其余留给人工。

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use super::base::{
    check_success, click_by_text, contains_any, extract_twitter_handle, fill_field,
    find_by_texts, human_delay, needs_login, open, page_snapshot, truncate_chars,
};
use super::{SubmissionAdapter, SubmissionInput, SubmissionResult};
use crate::infrastructure::PageDriver;
use crate::models::website::non_empty;
use crate::models::{SubmissionContent, Website};

const DEFAULT_URL: &str = "https://www.producthunt.com/posts/new";
const LOGIN_URL: &str = "https://www.producthunt.com/login";

/// Product Hunt 标语的长度上限
const TAGLINE_LIMIT: usize = 60;

pub struct ProductHuntAdapter;

#[async_trait]
impl SubmissionAdapter for ProductHuntAdapter {
    fn name(&self) -> &'static str {
        "producthunt"
    }

    async fn submit(
        &self,
        page: &dyn PageDriver,
        input: &SubmissionInput<'_>,
    ) -> Result<SubmissionResult> {
        let website = input.website;
        let target = input
            .directory
            .submission_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_URL);

        info!("  -> 打开 {}", target);
        open(page, target, (2000, 3000)).await?;

        if needs_login(
            page,
            "form input[name=\"name\"], input[placeholder*=\"product\" i]",
            "a[href*=\"login\"]",
            &["Log in", "Sign in"],
        )
        .await
        {
            return Ok(SubmissionResult::needs_auth("Product Hunt", LOGIN_URL));
        }

        info!("  -> 开始多步提交向导");

        if let Some(failure) = fill_basic_info(page, website, input.content).await {
            return Ok(failure);
        }
        next_step(page).await;

        handle_media_step(page, website).await;
        next_step(page).await;

        fill_details_step(page, website, input.content).await;
        next_step(page).await;

        configure_launch_step(page, website).await;

        info!("  -> 最终提交");
        if !final_submit(page).await {
            warn!("  -> 没有找到最终提交按钮");
        }
        human_delay(3000, 5000).await;

        let (url, content) = page_snapshot(page).await?;
        let success = check_producthunt_success(&url, &content);
        if success {
            info!("  -> 产品已提交/已排期");
        }
        let live_url = (success && url.contains("/posts/")).then(|| url.clone());
        Ok(SubmissionResult::verdict(
            success,
            url,
            "Product Hunt submission may require additional steps",
        )
        .with_live_url(live_url))
    }
}

/// 第 1 步：名称、标语、链接；名称填不上时直接失败
async fn fill_basic_info(
    page: &dyn PageDriver,
    website: &Website,
    content: &SubmissionContent,
) -> Option<SubmissionResult> {
    info!("  -> 第 1 步: 基本信息");

    let name_filled = fill_field(
        page,
        "input[name=\"name\"], input[placeholder*=\"name\" i], input[aria-label*=\"name\" i]",
        &website.name,
        false,
    )
    .await;
    if !name_filled {
        return Some(SubmissionResult::failed("Could not find product name field"));
    }

    if let Some(tagline) = non_empty(&content.tagline).or_else(|| non_empty(&website.tagline)) {
        fill_field(
            page,
            "input[name=\"tagline\"], input[placeholder*=\"tagline\" i], textarea[name=\"tagline\"]",
            &truncate_chars(tagline, TAGLINE_LIMIT),
            false,
        )
        .await;
    }

    fill_field(
        page,
        "input[name=\"url\"], input[name=\"link\"], input[placeholder*=\"link\" i], input[type=\"url\"]",
        &website.url,
        false,
    )
    .await;

    None
}

/// 第 2 步：只支持粘贴图片地址，文件上传留给人工
async fn handle_media_step(page: &dyn PageDriver, website: &Website) {
    info!("  -> 第 2 步: 媒体");
    let Some(screenshot) = non_empty(&website.screenshot_url) else {
        return;
    };
    let input = "input[name=\"gallery_url\"], input[placeholder*=\"image url\" i]";
    if page.exists(input).await.unwrap_or(false) {
        fill_field(page, input, screenshot, false).await;
    }
}

/// 第 3 步：描述、话题、定价
async fn fill_details_step(page: &dyn PageDriver, website: &Website, content: &SubmissionContent) {
    info!("  -> 第 3 步: 详情");

    let description = non_empty(&content.long_description)
        .or_else(|| non_empty(&website.description_medium))
        .or_else(|| non_empty(&website.description_long));
    if let Some(description) = description {
        fill_field(
            page,
            "textarea[name=\"description\"], textarea[placeholder*=\"description\" i], [contenteditable=\"true\"]",
            description,
            false,
        )
        .await;
    }

    if let Some(topic) = non_empty(&website.industry).or_else(|| non_empty(&website.category)) {
        if click_by_text(page, "button, label", &[topic]).await {
            human_delay(100, 400).await;
        }
    }

    if let Some(pricing) = non_empty(&website.pricing_model) {
        if click_by_text(page, "button, label", &[pricing]).await {
            human_delay(100, 400).await;
        }
    }
}

/// 第 4 步：创作者的 Twitter；发布时间留给人工
async fn configure_launch_step(page: &dyn PageDriver, website: &Website) {
    info!("  -> 第 4 步: 发布配置");
    if let Some(handle) = non_empty(&website.twitter_url).and_then(extract_twitter_handle) {
        fill_field(
            page,
            "input[name=\"maker_twitter\"], input[placeholder*=\"twitter\" i]",
            &handle,
            false,
        )
        .await;
    }
}

/// 点击 Next / Continue，退回到非发布类的提交按钮
async fn next_step(page: &dyn PageDriver) {
    let mut selector = find_by_texts(page, "button", &["Next", "Continue"]).await;
    if selector.is_none() {
        let submit = "button[type=\"submit\"]";
        let is_launch = find_by_texts(page, submit, &["Launch", "Schedule"]).await.is_some();
        if !is_launch && page.exists(submit).await.unwrap_or(false) {
            selector = Some(submit.to_string());
        }
    }

    match selector {
        Some(selector) => {
            if page.click(&selector).await.is_ok() {
                human_delay(1000, 2000).await;
            }
        }
        None => warn!("  -> 没有找到下一步按钮"),
    }
    human_delay(1500, 2500).await;
}

async fn final_submit(page: &dyn PageDriver) -> bool {
    click_by_text(page, "button", &["Schedule", "Launch", "Submit", "Post"]).await
}

/// Product Hunt 的结果页判定
pub fn check_producthunt_success(url: &str, content: &str) -> bool {
    (url.contains("/posts/") && !url.contains("/new"))
        || contains_any(
            url,
            content,
            &["scheduled", "launching", "congratulations", "your product"],
        )
        || check_success(url, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launched_post_page_counts_as_success() {
        assert!(check_producthunt_success("https://www.producthunt.com/posts/acme", ""));
        assert!(check_producthunt_success(
            "https://www.producthunt.com/posts/new",
            "Congratulations! Your launch is scheduled"
        ));
        assert!(!check_producthunt_success("https://www.producthunt.com/posts/new", "Step 1"));
    }
}
