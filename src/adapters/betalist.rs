//! BetaList 适配器（https://betalist.com/submit，需要登录）

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::base::{
    accept_terms, check_success, contains_any, fill_field, human_delay, needs_login, open,
    page_snapshot, select_option, submit_form, truncate_chars,
};
use super::{SubmissionAdapter, SubmissionInput, SubmissionResult};
use crate::infrastructure::PageDriver;
use crate::models::website::non_empty;

const DEFAULT_URL: &str = "https://betalist.com/submit";
const LOGIN_URL: &str = "https://betalist.com/users/sign_in";

pub struct BetaListAdapter;

#[async_trait]
impl SubmissionAdapter for BetaListAdapter {
    fn name(&self) -> &'static str {
        "betalist"
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
        open(page, target, (1000, 2000)).await?;

        if needs_login(
            page,
            "form input[name*=\"startup\"]",
            "a[href*=\"sign_in\"], a[href*=\"login\"]",
            &[],
        )
        .await
        {
            return Ok(SubmissionResult::needs_auth("BetaList", LOGIN_URL));
        }

        info!("  -> 填写表单");
        fill_field(page, "input[name=\"startup[name]\"]", &website.name, false).await;
        fill_field(page, "input[name=\"startup[url]\"]", &website.url, false).await;

        if let Some(tagline) = non_empty(&content.tagline).or_else(|| non_empty(&website.tagline)) {
            let tagline = truncate_chars(tagline, 140);
            fill_field(page, "input[name=\"startup[tagline]\"]", &tagline, false).await;
        }

        let description = non_empty(&content.short_description)
            .or_else(|| non_empty(&website.description_short))
            .or_else(|| non_empty(&website.description_medium));
        if let Some(description) = description {
            fill_field(page, "textarea[name=\"startup[description]\"]", description, false).await;
        }

        if let Some(email) = website.email() {
            fill_field(page, "input[name=\"startup[email]\"]", email, false).await;
        }

        let category = non_empty(&website.category).or_else(|| non_empty(&website.industry));
        if let Some(category) = category {
            let select = "select[name*=\"category\"], select[name*=\"topic\"]";
            if page.exists(select).await.unwrap_or(false) {
                select_option(page, select, category).await;
            }
        }

        accept_terms(
            page,
            "input[type=\"checkbox\"][name*=\"terms\"], input[type=\"checkbox\"][name*=\"agree\"]",
        )
        .await;

        info!("  -> 提交表单");
        submit_form(page, "button[type=\"submit\"], input[type=\"submit\"]").await;
        human_delay(2000, 3000).await;

        let (url, content) = page_snapshot(page).await?;
        let success = check_betalist_success(&url, &content);
        if success {
            info!("  -> 提交成功");
        }
        Ok(SubmissionResult::verdict(success, url, "Could not confirm submission"))
    }
}

/// BetaList 的结果页判定
pub fn check_betalist_success(url: &str, content: &str) -> bool {
    url.contains("/startups/")
        || contains_any(url, content, &["thank you", "submitted", "pending review", "we'll review"])
        || check_success(url, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_page_counts_as_success() {
        assert!(check_betalist_success("https://betalist.com/startups/acme", ""));
        assert!(check_betalist_success(
            "https://betalist.com/submit",
            "We'll review your startup soon"
        ));
        assert!(!check_betalist_success("https://betalist.com/submit", "Name can't be blank"));
    }
}
