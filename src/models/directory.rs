use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::nullable;

/// 目录站点的提交方式
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionType {
    Api,
    #[default]
    Form,
    Email,
    Manual,
}

/// 适配器配置
///
/// `form_fields` 是"语义字段名 → CSS 选择器"的映射，`submit` 键是提交按钮选择器。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdapterConfig {
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub form_fields: BTreeMap<String, String>,
}

impl AdapterConfig {
    /// 提交按钮选择器（来自 `form_fields.submit`）
    pub fn submit_selector(&self) -> Option<&str> {
        self.form_fields.get("submit").map(String::as_str)
    }

    /// 需要填写的字段（排除 `submit`）
    pub fn fill_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.form_fields
            .iter()
            .filter(|(name, _)| name.as_str() != "submit")
            .map(|(name, selector)| (name.as_str(), selector.as_str()))
    }

    pub fn has_form_fields(&self) -> bool {
        !self.form_fields.is_empty()
    }
}

/// 目录站点描述（只读目录数据）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Directory {
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub submission_type: SubmissionType,
    #[serde(default)]
    pub submission_url: Option<String>,
    #[serde(default)]
    pub adapter_name: Option<String>,
    #[serde(default)]
    pub adapter_config: Option<AdapterConfig>,
    #[serde(default = "default_active", deserialize_with = "nullable::or_true")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Directory {
    /// 实际提交地址：优先 submission_url，否则站点首页
    pub fn target_url(&self) -> &str {
        self.submission_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.url)
    }

    /// 是否带有显式的字段映射
    pub fn has_adapter_config(&self) -> bool {
        self.adapter_config
            .as_ref()
            .is_some_and(AdapterConfig::has_form_fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_key_is_split_from_fill_fields() {
        let directory: Directory = serde_json::from_value(serde_json::json!({
            "id": "d1",
            "name": "Demo",
            "url": "https://demo.test",
            "adapter_config": {
                "form_fields": { "name": "#n", "url": "#u", "submit": "#s" }
            }
        }))
        .unwrap();

        let config = directory.adapter_config.as_ref().unwrap();
        assert_eq!(config.submit_selector(), Some("#s"));
        let fields: Vec<_> = config.fill_fields().collect();
        assert_eq!(fields, vec![("name", "#n"), ("url", "#u")]);
        assert!(directory.has_adapter_config());
        assert_eq!(directory.target_url(), "https://demo.test");
    }

    #[test]
    fn null_adapter_config_means_auto_detect() {
        let directory: Directory = serde_json::from_value(serde_json::json!({
            "name": "Demo",
            "url": "https://demo.test",
            "submission_url": "https://demo.test/submit",
            "adapter_config": null,
            "submission_type": "form"
        }))
        .unwrap();

        assert!(!directory.has_adapter_config());
        assert!(directory.is_active);
        assert_eq!(directory.target_url(), "https://demo.test/submit");
    }
}
