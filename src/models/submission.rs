use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::directory::Directory;
use super::nullable;
use super::website::{non_empty, Website};

/// 作业状态
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Queued,
    #[default]
    Pending,
    InProgress,
    Submitted,
    Approved,
    Rejected,
    NeedsReview,
    Failed,
    Expired,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::NeedsReview => "needs_review",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 错误类别（持久化到 `error_category`）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transient,
    Permanent,
    Infrastructure,
    RateLimited,
    Configuration,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Infrastructure => "infrastructure",
            Self::RateLimited => "rate_limited",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条提交作业（submissions 表的一行，附带嵌入的网站与目录记录）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: String,
    #[serde(default)]
    pub website_id: Option<String>,
    #[serde(default)]
    pub directory_id: Option<String>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub status: SubmissionStatus,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub retry_count: u32,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub infrastructure_retries: u32,
    #[serde(default)]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "nullable::lenient")]
    pub error_category: Option<ErrorCategory>,
    #[serde(default)]
    pub listing_url: Option<String>,
    #[serde(default)]
    pub title_used: Option<String>,
    #[serde(default)]
    pub description_used: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// 嵌入的网站记录（`website:websites(*)`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<Website>,
    /// 嵌入的目录记录（`directory:directories(*)`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<Directory>,
}

impl Submission {
    /// 是否已到重试时间（未设置 next_retry_at 视为立即可处理）
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.map_or(true, |at| at <= now)
    }

    /// 把一次更新合并到本地记录（内存存储使用）
    pub fn apply(&mut self, update: &SubmissionUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(retry_count) = update.retry_count {
            self.retry_count = retry_count;
        }
        if let Some(infra) = update.infrastructure_retries {
            self.infrastructure_retries = infra;
        }
        if let Some(next) = &update.next_retry_at {
            self.next_retry_at = *next;
        }
        if let Some(message) = &update.error_message {
            self.error_message = message.clone();
        }
        if let Some(category) = &update.error_category {
            self.error_category = *category;
        }
        if let Some(listing_url) = &update.listing_url {
            self.listing_url = listing_url.clone();
        }
        if let Some(title) = &update.title_used {
            self.title_used = title.clone();
        }
        if let Some(description) = &update.description_used {
            self.description_used = description.clone();
        }
        if let Some(submitted_at) = &update.submitted_at {
            self.submitted_at = *submitted_at;
        }
        if let Some(updated_at) = update.updated_at {
            self.updated_at = Some(updated_at);
        }
    }
}

/// 作业的部分更新
///
/// 外层 `None` 表示"不修改该列"，`Some(None)` 表示写入 `null`。
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SubmissionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubmissionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<Option<ErrorCategory>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_used: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_used: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SubmissionUpdate {
    /// 认领作业：标记 in_progress 并记录即将提交的标题与描述
    pub fn in_progress(title_used: Option<String>, description_used: Option<String>) -> Self {
        Self {
            status: Some(SubmissionStatus::InProgress),
            title_used: Some(title_used),
            description_used: Some(description_used),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// 提交成功
    pub fn submitted(listing_url: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            status: Some(SubmissionStatus::Submitted),
            submitted_at: Some(Some(now)),
            listing_url: Some(listing_url),
            next_retry_at: Some(None),
            updated_at: Some(now),
            ..Default::default()
        }
    }
}

/// 提交内容（从网站字段按回退顺序组装）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubmissionContent {
    pub tagline: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
}

impl SubmissionContent {
    /// - tagline = website.tagline
    /// - short = description_short，否则 tagline
    /// - long = description_medium，否则 description_long，否则 description_short
    pub fn from_website(website: &Website) -> Self {
        let tagline = non_empty(&website.tagline).map(str::to_string);
        let short_description = non_empty(&website.description_short)
            .map(str::to_string)
            .or_else(|| tagline.clone());
        let long_description = non_empty(&website.description_medium)
            .or_else(|| non_empty(&website.description_long))
            .or_else(|| non_empty(&website.description_short))
            .map(str::to_string);

        Self {
            tagline,
            short_description,
            long_description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn website() -> Website {
        Website {
            name: "Acme".into(),
            url: "https://acme.test".into(),
            tagline: Some("Rockets for everyone".into()),
            ..Default::default()
        }
    }

    #[test]
    fn short_description_falls_back_to_tagline() {
        let content = SubmissionContent::from_website(&website());
        assert_eq!(content.tagline.as_deref(), Some("Rockets for everyone"));
        assert_eq!(content.short_description.as_deref(), Some("Rockets for everyone"));
        assert_eq!(content.long_description, None);
    }

    #[test]
    fn long_description_prefers_medium_then_long_then_short() {
        let mut site = website();
        site.description_short = Some("short".into());
        assert_eq!(
            SubmissionContent::from_website(&site).long_description.as_deref(),
            Some("short")
        );

        site.description_long = Some("long".into());
        assert_eq!(
            SubmissionContent::from_website(&site).long_description.as_deref(),
            Some("long")
        );

        site.description_medium = Some("medium".into());
        assert_eq!(
            SubmissionContent::from_website(&site).long_description.as_deref(),
            Some("medium")
        );
    }

    #[test]
    fn update_serialises_explicit_nulls_only() {
        let update = SubmissionUpdate {
            status: Some(SubmissionStatus::Pending),
            next_retry_at: Some(None),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "status": "pending", "next_retry_at": null })
        );
    }

    #[test]
    fn apply_merges_partial_update() {
        let mut job = Submission {
            id: "j1".into(),
            error_message: Some("old".into()),
            ..Default::default()
        };
        job.apply(&SubmissionUpdate {
            status: Some(SubmissionStatus::Failed),
            infrastructure_retries: Some(2),
            error_message: Some(None),
            ..Default::default()
        });

        assert_eq!(job.status, SubmissionStatus::Failed);
        assert_eq!(job.infrastructure_retries, 2);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.error_message, None);
    }
}
