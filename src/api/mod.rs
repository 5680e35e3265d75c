mod export;
mod home;
mod monitoring;
mod receipts;
mod reports;
mod search;
mod tags;
pub mod utils;

use crate::util::logging::standards::events;
use crate::util::{middleware, ServerError};
use crate::AppState;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{header, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration as StdDuration;
use tower_http::timeout::TimeoutLayer;
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::{info, warn};

/// HKDF 派生要求主密钥至少 32 字节
const MIN_MASTER_KEY_LEN: usize = 32;

/// 由配置密钥经 HKDF 派生会话签名密钥；密钥为空时使用进程内随机密钥
fn session_signing_key(secret: &str) -> Key {
    if secret.is_empty() {
        warn!("未配置会话密钥，使用随机密钥，重启后会话失效");
        return Key::generate();
    }
    let len = secret.len().max(MIN_MASTER_KEY_LEN);
    let material: Vec<u8> = secret.bytes().cycle().take(len).collect();
    Key::derive_from(&material)
}

/// 请求体超限时统一返回 413 页面
async fn payload_too_large_page(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if is_html {
        return response;
    }
    warn!(event = events::UPLOAD_REJECTED, path = %path, "请求体超出大小限制");
    ServerError::PayloadTooLarge.into_response()
}

pub fn routes(app_state: AppState) -> Router {
    let config = app_state.config.clone();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(config.session_timeout)))
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_signed(session_signing_key(&config.secret_key));

    info!(
        body_limit_mb = config.uploads.max_content_length_mb,
        request_timeout_secs = config.server.request_timeout_secs,
        "注册路由"
    );

    let receipt_routes = Router::new()
        .route("/receipts/", get(receipts::index))
        .route("/receipts/upload", get(receipts::upload_form).post(receipts::upload))
        .route("/receipts/:id", get(receipts::detail))
        .route("/receipts/:id/tags", post(receipts::assign_tag))
        .route("/receipts/:id/file", get(receipts::serve_file))
        .route("/receipts/:id/meta", post(receipts::update_meta))
        .route("/receipts/:id/reprocess", post(receipts::reprocess))
        .route("/receipts/:id/delete", post(receipts::delete));

    let tag_routes = Router::new()
        .route("/tags/", get(tags::index))
        .route("/tags/create", post(tags::create))
        .route("/tags/:id/edit", get(tags::edit_form).post(tags::edit))
        .route("/tags/:id/delete", post(tags::delete));

    Router::new()
        .route("/", get(home::index))
        .merge(receipt_routes)
        .merge(tag_routes)
        .route("/search/", get(search::index))
        .route("/export/receipts.csv", get(export::receipts_csv))
        .route("/reports/", get(reports::index))
        .route("/health", get(monitoring::health))
        .fallback(not_found)
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.uploads.max_bytes()))
        .layer(from_fn(payload_too_large_page))
        .layer(session_layer)
        .layer(TimeoutLayer::new(StdDuration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(from_fn(middleware::request_logging_middleware))
}

async fn not_found() -> ServerError {
    ServerError::NotFound
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_signing_key_derivation() {
        let a = session_signing_key("short");
        let b = session_signing_key("short");
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), session_signing_key("other-secret").master());

        // 派生结果不是密钥原文的重复
        let repeated: Vec<u8> = "short".bytes().cycle().take(a.master().len()).collect();
        assert_ne!(a.master(), repeated.as_slice());

        // 空密钥每次随机
        assert_ne!(session_signing_key("").master(), session_signing_key("").master());
    }

    #[tokio::test]
    async fn test_unknown_path_is_html_404() {
        let app = TestApp::new().await;
        let response = app.get("/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("404 Not Found"));
    }

    #[tokio::test]
    async fn test_post_without_csrf_is_rejected() {
        let app = TestApp::new().await;
        let response = app.post_raw("/tags/create", "name=food".to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.state.database.list_tags().await.unwrap().is_empty());

        let response = app
            .post_raw("/tags/create", "name=food&csrf_token=wrong".to_string())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_gets_413_page() {
        let app = TestApp::new().await;
        let big = vec![b'x'; 2 * 1024 * 1024];
        let response = app.post_multipart("/receipts/upload", "big.png", &big).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body_string(response).await.contains("File too large"));
        assert_eq!(app.state.database.count_receipts().await.unwrap(), 0);
    }
}
