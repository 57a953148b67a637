use crate::models::{Directory, Submission, Website};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

/// 队列种子文件
///
/// ```toml
/// [[websites]]
/// id = "w1"
/// name = "Acme"
/// url = "https://acme.test"
///
/// [[directories]]
/// id = "d1"
/// name = "Demo"
/// url = "https://demo.test"
/// submission_url = "https://demo.test/submit"
///
/// [[submissions]]
/// id = "s1"
/// website_id = "w1"
/// directory_id = "d1"
/// created_at = "2024-01-01T00:00:00Z"
/// ```
///
/// 时间字段写成带引号的 RFC 3339 字符串。
#[derive(Debug, Default, Deserialize)]
pub struct QueueSeed {
    #[serde(default)]
    pub websites: Vec<Website>,
    #[serde(default)]
    pub directories: Vec<Directory>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

impl QueueSeed {
    /// 按 website_id / directory_id 把网站和目录嵌入到作业中
    pub fn into_jobs(self) -> Vec<Submission> {
        let websites: HashMap<String, Website> = self
            .websites
            .into_iter()
            .map(|w| (w.id.clone(), w))
            .collect();
        let directories: HashMap<String, Directory> = self
            .directories
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        self.submissions
            .into_iter()
            .map(|mut job| {
                if job.website.is_none() {
                    job.website = job
                        .website_id
                        .as_ref()
                        .and_then(|id| websites.get(id).cloned());
                }
                if job.directory.is_none() {
                    job.directory = job
                        .directory_id
                        .as_ref()
                        .and_then(|id| directories.get(id).cloned());
                }
                job
            })
            .collect()
    }
}

/// 解析种子文本
pub fn parse_queue_seed(content: &str) -> Result<Vec<Submission>> {
    let seed: QueueSeed = toml::from_str(content).context("无法解析队列种子")?;
    Ok(seed.into_jobs())
}

/// 从 TOML 文件加载队列种子
pub async fn load_queue_seed(path: &Path) -> Result<Vec<Submission>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", path.display()))?;

    let jobs = parse_queue_seed(&content)
        .with_context(|| format!("无法解析TOML文件: {}", path.display()))?;

    tracing::info!("成功加载 {} 个作业: {}", jobs.len(), path.display());
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubmissionStatus;

    #[test]
    fn seed_embeds_website_and_directory() {
        let jobs = parse_queue_seed(
            r##"
            [[websites]]
            id = "w1"
            name = "Acme"
            url = "https://acme.test"

            [[directories]]
            id = "d1"
            name = "Demo"
            url = "https://demo.test"

            [directories.adapter_config.form_fields]
            name = "#n"
            submit = "#s"

            [[submissions]]
            id = "s1"
            website_id = "w1"
            directory_id = "d1"
            created_at = "2024-01-01T00:00:00Z"

            [[submissions]]
            id = "s2"
            website_id = "w1"
            directory_id = "missing"
            "##,
        )
        .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].status, SubmissionStatus::Pending);
        assert_eq!(jobs[0].website.as_ref().unwrap().name, "Acme");
        let directory = jobs[0].directory.as_ref().unwrap();
        assert_eq!(
            directory.adapter_config.as_ref().unwrap().submit_selector(),
            Some("#s")
        );
        assert!(jobs[1].directory.is_none());
    }
}
