//! Supabase (PostgREST) 存储

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use super::SubmissionStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{ErrorCategory, Submission, SubmissionStatus, SubmissionUpdate};

const SUBMISSIONS: &str = "submissions";

/// 嵌入网站和目录记录
const EMBED_SELECT: &str = "*,website:websites(*),directory:directories(*)";

pub struct SupabaseStore {
    client: Client,
    rest_url: String,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(supabase_url: &str, service_key: &str) -> StoreResult<Self> {
        let rest_url = format!("{}/rest/v1", supabase_url.trim_end_matches('/'));
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|source| StoreError::RequestFailed {
                endpoint: rest_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            rest_url,
            service_key: service_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> StoreResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| StoreError::RequestFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// 无法解析的作业转入人工审核，避免每批都被它卡住
    async fn park_malformed(&self, row: &JsonValue, error: &serde_json::Error) {
        let Some(id) = row.get("id").and_then(JsonValue::as_str) else {
            warn!("⚠️ 跳过缺少 id 的作业记录: {}", error);
            return;
        };
        warn!("[作业 {}] ⚠️ 记录无法解析，转为 needs_review: {}", id, error);

        let update = SubmissionUpdate {
            status: Some(SubmissionStatus::NeedsReview),
            error_message: Some(Some(format!("Invalid submission record: {}", error))),
            error_category: Some(Some(ErrorCategory::Configuration)),
            next_retry_at: Some(None),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = self.update(id, &update).await {
            warn!("[作业 {}] ❌ 标记 needs_review 失败: {}", id, e);
        }
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> StoreResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|source| StoreError::DecodeFailed {
                endpoint: endpoint.to_string(),
                source,
            })
    }
}

#[async_trait]
impl SubmissionStore for SupabaseStore {
    async fn fetch_pending(
        &self,
        limit: usize,
        max_retry_count: u32,
    ) -> StoreResult<Vec<Submission>> {
        let endpoint = self.table_url(SUBMISSIONS);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let request = self.client.get(&endpoint).query(&[
            ("select", EMBED_SELECT.to_string()),
            ("status", "eq.pending".to_string()),
            ("retry_count", format!("lt.{}", max_retry_count)),
            (
                "or",
                format!("(next_retry_at.is.null,next_retry_at.lte.{})", now),
            ),
            ("order", "created_at.asc".to_string()),
            ("limit", limit.to_string()),
        ]);

        let response = self.send(&endpoint, request).await?;
        let rows: Vec<JsonValue> = Self::decode(&endpoint, response).await?;

        // 逐行解析：一行坏数据不能拖住整个队列
        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<Submission>(row.clone()) {
                Ok(job) => jobs.push(job),
                Err(e) => self.park_malformed(&row, &e).await,
            }
        }
        debug!("读取到 {} 条待处理作业", jobs.len());
        Ok(jobs)
    }

    async fn claim(
        &self,
        id: &str,
        title_used: Option<String>,
        description_used: Option<String>,
    ) -> StoreResult<bool> {
        let endpoint = self.table_url(SUBMISSIONS);
        let update = SubmissionUpdate::in_progress(title_used, description_used);

        let request = self
            .client
            .patch(&endpoint)
            .query(&[("id", format!("eq.{}", id)), ("status", "eq.pending".to_string())])
            .header("Prefer", "return=representation")
            .json(&update);

        let response = self.send(&endpoint, request).await?;
        let rows: Vec<JsonValue> = Self::decode(&endpoint, response).await?;
        Ok(!rows.is_empty())
    }

    async fn update(&self, id: &str, update: &SubmissionUpdate) -> StoreResult<()> {
        let endpoint = self.table_url(SUBMISSIONS);

        let request = self
            .client
            .patch(&endpoint)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(update);

        self.send(&endpoint, request).await?;
        Ok(())
    }
}
