use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    UpstreamUnavailable,
    CacheUnavailable,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "未授权访问".to_string()),
            AppError::UpstreamUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "上游服务不可用".to_string(),
            ),
            AppError::CacheUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "缓存读取失败".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message,
        });

        (status, body).into_response()
    }
}
