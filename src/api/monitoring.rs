//! 健康检查

use crate::build_info;
use crate::AppState;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

async fn component_ok<F>(name: &str, check: F) -> bool
where
    F: std::future::Future<Output = anyhow::Result<bool>>,
{
    match tokio::time::timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok(healthy)) => healthy,
        Ok(Err(e)) => {
            warn!(component = name, error = %e, "健康检查失败");
            false
        }
        Err(_) => {
            warn!(component = name, "健康检查超时");
            false
        }
    }
}

/// 数据库与存储均可用时返回 200，否则 503
pub async fn health(State(app_state): State<AppState>) -> Response {
    let database = component_ok("database", app_state.database.health_check()).await;
    let storage = component_ok("storage", app_state.storage.health_check()).await;
    let healthy = database && storage;

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "database": if database { "ok" } else { "error" },
        "storage": if storage { "ok" } else { "error" },
        "version": build_info::summary(),
        "ocr": app_state.extractor.stats(),
    });
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let mut resp = (status, Json(body)).into_response();
    resp.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    resp
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use axum::http::{header, StatusCode};

    #[tokio::test]
    async fn test_health_reports_components() {
        let app = TestApp::new().await;
        let response = app.get("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "ok");
        assert_eq!(body["storage"], "ok");
        assert!(body["version"]
            .as_str()
            .unwrap()
            .starts_with(env!("CARGO_PKG_VERSION")));
        assert_eq!(body["ocr"]["capacity"], 1);
    }
}
