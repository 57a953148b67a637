//! Indie Hackers 适配器（https://www.indiehackers.com/products/new，需要登录）
//!
//! 只看跳转后的地址判断成败：创建成功会跳到产品页。

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::base::{
    click_by_text, extract_twitter_handle, fill_field, find_by_texts, human_delay, needs_login,
    open, select_option, truncate_chars, wait_after_submit,
};
use super::{SubmissionAdapter, SubmissionInput, SubmissionResult};
use crate::infrastructure::PageDriver;
use crate::models::website::non_empty;

const DEFAULT_URL: &str = "https://www.indiehackers.com/products/new";
const LOGIN_URL: &str = "https://www.indiehackers.com/sign-in";

pub struct IndieHackersAdapter;

#[async_trait]
impl SubmissionAdapter for IndieHackersAdapter {
    fn name(&self) -> &'static str {
        "indiehackers"
    }

    async fn submit(
        &self,
        page: &dyn PageDriver,
        input: &SubmissionInput<'_>,
    ) -> Result<SubmissionResult> {
        let website = input.website;
        let content = input.content;
        let target = input
            .directory
            .submission_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_URL);

        info!("  -> 打开 {}", target);
        open(page, target, (1500, 2500)).await?;

        if needs_login(
            page,
            "form input[name=\"name\"], form input[placeholder*=\"name\" i]",
            "a[href*=\"sign-in\"]",
            &["Sign in", "Log in"],
        )
        .await
        {
            return Ok(SubmissionResult::needs_auth("Indie Hackers", LOGIN_URL));
        }

        info!("  -> 填写产品表单");
        fill_field(
            page,
            "input[name=\"name\"], input[placeholder*=\"name\" i], input[aria-label*=\"name\" i]",
            &website.name,
            false,
        )
        .await;

        if let Some(tagline) = non_empty(&content.tagline).or_else(|| non_empty(&website.tagline)) {
            fill_field(
                page,
                "input[name=\"tagline\"], input[placeholder*=\"tagline\" i], input[placeholder*=\"short description\" i]",
                &truncate_chars(tagline, 160),
                false,
            )
            .await;
        }

        fill_field(
            page,
            "input[name=\"url\"], input[name=\"website\"], input[placeholder*=\"url\" i], input[type=\"url\"]",
            &website.url,
            false,
        )
        .await;

        let description = non_empty(&content.long_description)
            .or_else(|| non_empty(&website.description_medium))
            .or_else(|| non_empty(&website.description_short));
        if let Some(description) = description {
            fill_field(
                page,
                "textarea[name=\"description\"], textarea[placeholder*=\"description\" i]",
                description,
                false,
            )
            .await;
        }

        if let Some(handle) = non_empty(&website.twitter_url).and_then(extract_twitter_handle) {
            fill_field(
                page,
                "input[name=\"twitter\"], input[placeholder*=\"twitter\" i]",
                &handle,
                false,
            )
            .await;
        }

        if let Some(category) = non_empty(&website.category).or_else(|| non_empty(&website.industry)) {
            select_category(page, category).await;
        }

        info!("  -> 提交表单");
        submit_product(page).await;
        human_delay(3000, 5000).await;

        let url = page.url().await?;
        let success = check_indiehackers_success(&url);
        if success {
            info!("  -> 产品创建成功");
        }
        Ok(
            SubmissionResult::verdict(success, url.clone(), "Could not confirm product creation")
                .with_live_url(success.then_some(url)),
        )
    }
}

/// 下拉框优先，其次点击同名的按钮或标签
async fn select_category(page: &dyn PageDriver, category: &str) {
    let select = "select[name*=\"category\"], select[name*=\"topic\"]";
    if page.exists(select).await.unwrap_or(false) {
        select_option(page, select, category).await;
        return;
    }
    if click_by_text(page, "button, label", &[category]).await {
        human_delay(100, 400).await;
    }
}

/// 可用的提交按钮，退回到文本为 Create / Submit 的按钮
async fn submit_product(page: &dyn PageDriver) {
    let enabled = "button[type=\"submit\"]:not([disabled])";
    let selector = if page.exists(enabled).await.unwrap_or(false) {
        Some(enabled.to_string())
    } else {
        find_by_texts(page, "button", &["Create", "Submit"]).await
    };

    if let Some(selector) = selector {
        if page.click(&selector).await.is_ok() {
            wait_after_submit(page).await;
        }
    }
}

/// 跳转到产品页即视为成功
pub fn check_indiehackers_success(url: &str) -> bool {
    (url.contains("/products/") || url.contains("/product/")) && !url.contains("/new")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_product_pages_count() {
        assert!(check_indiehackers_success("https://www.indiehackers.com/products/acme"));
        assert!(check_indiehackers_success("https://www.indiehackers.com/product/acme"));
        assert!(!check_indiehackers_success("https://www.indiehackers.com/products/new"));
        assert!(!check_indiehackers_success("https://www.indiehackers.com/"));
    }
}
