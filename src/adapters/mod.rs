//! 适配器层（Adapter Layer）
//!
//! 每个适配器知道如何驱动一个（或一类）目录站点的提交表单：
//! 导航 → 登录检查 → 填表 → 提交 → 根据结果页判断成败。
//!
//! ## 模块划分
//!
//! - `base`：共享的填表、点击、延时、关键词判定等自由函数
//! - `generic`：字段映射 / 自动识别 / AI 兜底的通用适配器
//! - `betalist` / `indiehackers` / `producthunt` / `crunchbase`：站点专用适配器
//! - `registry`：按名称查找适配器，未知名称退回 `generic`

pub mod base;
pub mod betalist;
pub mod crunchbase;
pub mod generic;
pub mod indiehackers;
pub mod producthunt;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infrastructure::PageDriver;
use crate::models::{Directory, SubmissionContent, Website};

pub use generic::GenericAdapter;
pub use registry::AdapterRegistry;

/// 一次提交所需的业务数据
#[derive(Debug, Clone, Copy)]
pub struct SubmissionInput<'a> {
    pub website: &'a Website,
    pub directory: &'a Directory,
    pub content: &'a SubmissionContent,
}

/// 适配器的提交结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "needs_auth", default)]
    pub needs_auth: bool,
    #[serde(rename = "login_url", skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
}

impl SubmissionResult {
    /// 根据结果页判定的结果；失败时带上 `error`
    pub fn verdict(success: bool, confirmation_url: String, error: &str) -> Self {
        Self {
            success,
            confirmation_url: Some(confirmation_url),
            error: (!success).then(|| error.to_string()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// 站点需要登录
    pub fn needs_auth(site: &str, login_url: &str) -> Self {
        Self::needs_auth_with(
            format!("Login required - {} requires authentication", site),
            login_url,
        )
    }

    pub fn needs_auth_with(error: impl Into<String>, login_url: &str) -> Self {
        Self {
            error: Some(error.into()),
            needs_auth: true,
            login_url: Some(login_url.to_string()),
            ..Default::default()
        }
    }

    pub fn with_live_url(mut self, live_url: Option<String>) -> Self {
        self.live_url = live_url;
        self
    }

    /// 成功时作为 listing_url 持久化的地址
    pub fn listing_url(&self) -> Option<String> {
        self.confirmation_url
            .clone()
            .or_else(|| self.live_url.clone())
    }

    /// 失败时交给分类器的错误文本
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "Submission failed".to_string())
    }
}

/// 提交能力
#[async_trait]
pub trait SubmissionAdapter: Send + Sync {
    /// 注册表中的名称（小写）
    fn name(&self) -> &'static str;

    async fn submit(
        &self,
        page: &dyn PageDriver,
        input: &SubmissionInput<'_>,
    ) -> Result<SubmissionResult>;
}
