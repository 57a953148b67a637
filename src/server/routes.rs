use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use super::AppState;

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "directory-submit-worker",
        "timestamp": Utc::now(),
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "browser": state.processor.browser().status(),
        "timestamp": Utc::now(),
    }))
}

/// 密钥逐字比较；没有配置密钥时拒绝所有请求
fn is_authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {}", secret))
}

pub async fn process_queue(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !is_authorized(&headers, state.cron_secret.as_deref()) {
        warn!("拒绝未授权的 /process-queue 请求");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response();
    }

    if state.processor.browser().status().is_shutting_down {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Worker is shutting down" })),
        )
            .into_response();
    }

    info!("📨 收到队列处理请求");
    match state.processor.run_batch().await {
        Ok(summary) if summary.processed == 0 => {
            Json(json!({ "message": "No pending jobs", "processed": 0 })).into_response()
        }
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            error!("队列处理失败: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{:#}", e) })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_secret_must_match_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));

        assert!(is_authorized(&headers, Some("s3cret")));
        assert!(!is_authorized(&headers, Some("other")));
        assert!(!is_authorized(&headers, None));
        assert!(!is_authorized(&headers, Some("")));
        assert!(!is_authorized(&HeaderMap::new(), Some("s3cret")));
    }
}
