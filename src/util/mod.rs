use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use std::fmt::Display;

pub mod config;
pub mod extract;
pub mod log;
pub mod logging;
pub mod middleware;
pub mod report;
pub mod session;

use report::PageRenderer;

/// 页面请求错误，统一渲染为 HTML 错误页
#[derive(Debug)]
pub enum ServerError {
    NotFound,
    BadRequest(String),
    PayloadTooLarge,
    Internal(anyhow::Error),
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::NotFound => write!(f, "Not Found"),
            ServerError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ServerError::PayloadTooLarge => write!(f, "File too large"),
            ServerError::Internal(err) => write!(f, "Server internal error: {}", err),
        }
    }
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (title, message) = match &self {
            ServerError::NotFound => (
                "Not Found",
                "The requested page or receipt does not exist.".to_string(),
            ),
            ServerError::BadRequest(msg) => ("Bad Request", msg.clone()),
            ServerError::PayloadTooLarge => (
                "File too large",
                "The uploaded file exceeds the maximum allowed size.".to_string(),
            ),
            ServerError::Internal(err) => {
                // 内部错误只写日志，不回显给用户
                tracing::error!(error = ?err, "请求处理失败");
                (
                    "Server Error",
                    "Something went wrong. Please try again.".to_string(),
                )
            }
        };
        (
            status,
            Html(PageRenderer::error_page(status.as_u16(), title, &message)),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err)
    }
}

impl From<tower_sessions::session::Error> for ServerError {
    fn from(err: tower_sessions::session::Error) -> Self {
        ServerError::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServerError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServerError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        let internal: ServerError = anyhow::anyhow!("db down").into();
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_error_is_not_leaked() {
        let response = ServerError::Internal(anyhow::anyhow!("secret path /srv/db")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
