use serde::{Deserialize, Serialize};

use super::nullable;

/// 待提交的网站（业务数据快照）
///
/// 只保留适配器填表会用到的列，其余列在反序列化时忽略。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Website {
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub url: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub description_short: Option<String>,
    #[serde(default)]
    pub description_medium: Option<String>,
    #[serde(default)]
    pub description_long: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub screenshot_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub founder_name: Option<String>,
    #[serde(default)]
    pub founder_email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub pricing_model: Option<String>,
}

impl Website {
    /// 联系邮箱，缺省时退回创始人邮箱
    pub fn email(&self) -> Option<&str> {
        non_empty(&self.contact_email).or_else(|| non_empty(&self.founder_email))
    }
}

/// 把空字符串视为缺失（数据库里常见 `""`）
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}
