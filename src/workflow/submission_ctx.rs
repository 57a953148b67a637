//! 作业处理上下文
//!
//! 封装"我正在处理哪一批的哪个作业"这一信息

use std::fmt::Display;

use crate::models::Submission;

/// 作业处理上下文
#[derive(Debug, Clone)]
pub struct SubmissionCtx {
    /// 作业 ID
    pub job_id: String,

    /// 批次编号（仅用于日志显示）
    pub batch_id: u64,

    /// 作业在本批中的序号（从1开始）
    pub job_index: usize,

    /// 目录名称，目录缺失时为 "unknown"
    pub directory_name: String,

    /// 目录配置的适配器名称
    pub adapter_name: Option<String>,
}

impl SubmissionCtx {
    pub fn new(job: &Submission, batch_id: u64, job_index: usize) -> Self {
        let directory = job.directory.as_ref();
        Self {
            job_id: job.id.clone(),
            batch_id,
            job_index,
            directory_name: directory
                .map(|d| d.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            adapter_name: directory.and_then(|d| d.adapter_name.clone()),
        }
    }
}

impl Display for SubmissionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[作业 {}]", self.job_id)
    }
}
