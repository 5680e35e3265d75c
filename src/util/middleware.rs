use crate::util::log::ACCESS_TARGET;
use crate::util::logging::standards::events;
use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use std::time::Instant;
use uuid::Uuid;

// 上传会同步执行OCR，阈值放宽
const SLOW_REQUEST_MS: u128 = 3_000;

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
}

fn parse_content_length(headers: &HeaderMap) -> usize {
    headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0)
}

fn is_quiet_path(path: &str) -> bool {
    path == "/health" || path == "/favicon.ico"
}

// 统一请求日志中间件
pub async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = extract_client_ip(request.headers());
    let request_size = parse_content_length(request.headers());
    request.extensions_mut().insert(request_id.clone());

    let response = next.run(request).await;
    let duration = start_time.elapsed();
    let status = response.status();
    let quiet_path = is_quiet_path(uri.path());

    if status.is_server_error() {
        tracing::error!(
            target: ACCESS_TARGET,
            event = events::REQUEST_ERROR,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            request_bytes = request_size,
            client_ip = client_ip.as_deref().unwrap_or("unknown")
        );
    } else if quiet_path {
        tracing::debug!(
            target: ACCESS_TARGET,
            event = events::REQUEST_COMPLETE,
            method = %method,
            path = %uri.path(),
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64
        );
    } else if status.is_client_error() {
        tracing::warn!(
            target: ACCESS_TARGET,
            event = events::REQUEST_COMPLETE,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            request_bytes = request_size,
            client_ip = client_ip.as_deref().unwrap_or("unknown")
        );
    } else {
        tracing::info!(
            target: ACCESS_TARGET,
            event = events::REQUEST_COMPLETE,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            request_bytes = request_size,
            client_ip = client_ip.as_deref().unwrap_or("unknown")
        );
    }

    if !quiet_path && duration.as_millis() > SLOW_REQUEST_MS {
        tracing::warn!(
            target: ACCESS_TARGET,
            event = events::REQUEST_SLOW,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            duration_ms = duration.as_millis() as u64,
            status = status.as_u16()
        );
    }

    response
}
