//! Crunchbase 适配器（https://www.crunchbase.com/add-new，需要免费账号）

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::base::{
    check_success, click_by_text, contains_any, fill_field, find_by_texts, human_delay,
    needs_login, open, page_snapshot, select_option, submit_form, truncate_chars,
    wait_after_submit,
};
use super::{SubmissionAdapter, SubmissionInput, SubmissionResult};
use crate::infrastructure::PageDriver;
use crate::models::website::non_empty;
use crate::models::Website;

const DEFAULT_URL: &str = "https://www.crunchbase.com/add-new";
const LOGIN_URL: &str = "https://www.crunchbase.com/login";

pub struct CrunchbaseAdapter;

#[async_trait]
impl SubmissionAdapter for CrunchbaseAdapter {
    fn name(&self) -> &'static str {
        "crunchbase"
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
            "form input[name=\"name\"], form input[aria-label*=\"name\" i]",
            "a[href*=\"login\"]",
            &["Sign in", "Log in"],
        )
        .await
        {
            return Ok(SubmissionResult::needs_auth_with(
                "Login required - Crunchbase requires a free account",
                LOGIN_URL,
            ));
        }

        select_entity_type(page).await;
        human_delay(1000, 1500).await;

        info!("  -> 填写公司信息");
        fill_field(
            page,
            "input[name=\"name\"], input[aria-label*=\"name\" i], input[placeholder*=\"organization name\" i]",
            &website.name,
            false,
        )
        .await;

        fill_field(
            page,
            "input[name=\"website\"], input[name=\"homepage_url\"], input[aria-label*=\"website\" i], input[type=\"url\"]",
            &website.url,
            false,
        )
        .await;

        let short = non_empty(&content.short_description)
            .or_else(|| non_empty(&website.description_short))
            .or_else(|| non_empty(&website.tagline));
        if let Some(short) = short {
            fill_field(
                page,
                "textarea[name=\"short_description\"], textarea[aria-label*=\"description\" i], input[name=\"tagline\"]",
                &truncate_chars(short, 250),
                false,
            )
            .await;
        }

        let long = non_empty(&content.long_description).or_else(|| non_empty(&website.description_medium));
        if let Some(long) = long {
            fill_field(
                page,
                "textarea[name=\"description\"], textarea[name=\"long_description\"]",
                long,
                false,
            )
            .await;
        }

        if let Some(founder) = non_empty(&website.founder_name) {
            fill_field(
                page,
                "input[name=\"founder\"], input[name=\"founder_name\"], input[aria-label*=\"founder\" i]",
                founder,
                false,
            )
            .await;
        }

        if let Some(industry) = non_empty(&website.industry).or_else(|| non_empty(&website.category)) {
            select_industry(page, industry).await;
        }

        fill_social_links(page, website).await;

        if let Some(location) = non_empty(&website.location) {
            fill_field(
                page,
                "input[name=\"location\"], input[name=\"headquarters\"], input[aria-label*=\"location\" i]",
                location,
                false,
            )
            .await;
        }

        info!("  -> 提交表单");
        if page.exists("button[type=\"submit\"]").await.unwrap_or(false) {
            submit_form(page, "button[type=\"submit\"]").await;
        } else if let Some(selector) = find_by_texts(page, "button", &["Submit", "Create"]).await {
            if page.click(&selector).await.is_ok() {
                wait_after_submit(page).await;
            }
        }
        human_delay(3000, 5000).await;

        let (url, content) = page_snapshot(page).await?;
        let success = check_crunchbase_success(&url, &content);
        if success {
            info!("  -> 公司资料已提交");
        }
        Ok(SubmissionResult::verdict(success, url, "Submission pending review"))
    }
}

/// 选择实体类型（公司 / 组织）
async fn select_entity_type(page: &dyn PageDriver) {
    let radio = "input[value=\"company\"]";
    if click_by_text(page, "button, label", &["Company", "Organization"]).await
        || (page.exists(radio).await.unwrap_or(false) && page.click(radio).await.is_ok())
    {
        human_delay(500, 1000).await;
    }
}

/// 下拉框优先，其次是自动补全输入框
async fn select_industry(page: &dyn PageDriver, industry: &str) {
    let select = "select[name=\"industry\"], select[name=\"category\"]";
    if page.exists(select).await.unwrap_or(false) {
        select_option(page, select, industry).await;
        return;
    }

    let input = "input[name=\"industry\"], input[aria-label*=\"industry\" i]";
    if !page.exists(input).await.unwrap_or(false) {
        return;
    }
    fill_field(page, input, industry, false).await;
    human_delay(500, 1000).await;

    let suggestion = ".suggestion, [role=\"option\"]";
    if page.exists(suggestion).await.unwrap_or(false) {
        let _ = page.click(suggestion).await;
    } else {
        click_by_text(page, "li", &[industry]).await;
    }
}

async fn fill_social_links(page: &dyn PageDriver, website: &Website) {
    if let Some(linkedin) = non_empty(&website.linkedin_url) {
        fill_field(
            page,
            "input[name=\"linkedin\"], input[name=\"linkedin_url\"], input[placeholder*=\"linkedin\" i]",
            linkedin,
            false,
        )
        .await;
    }
    if let Some(twitter) = non_empty(&website.twitter_url) {
        fill_field(
            page,
            "input[name=\"twitter\"], input[name=\"twitter_url\"], input[placeholder*=\"twitter\" i]",
            twitter,
            false,
        )
        .await;
    }
    if let Some(github) = non_empty(&website.github_url) {
        fill_field(
            page,
            "input[name=\"github\"], input[name=\"github_url\"], input[placeholder*=\"github\" i]",
            github,
            false,
        )
        .await;
    }
}

/// Crunchbase 的结果页判定
pub fn check_crunchbase_success(url: &str, content: &str) -> bool {
    url.contains("/organization/")
        || contains_any(
            url,
            content,
            &["successfully", "thank you", "submitted", "pending review"],
        )
        || check_success(url, content)
}
