use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

/// 从请求头派生的不可变请求上下文
/// 认证本身由网关层完成，这里只负责透传身份信息给上游调用
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub authorization: String,
    pub locale: String,
    pub user_id: String,
    pub device_token: String,
    pub brand_variation: String,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

pub async fn context_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();

    let authorization = header_value(headers, "authorization").ok_or(AppError::Unauthorized)?;
    let user_id = header_value(headers, "x-userid")
        .filter(|id| !id.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let context = RequestContext {
        authorization,
        user_id,
        locale: header_value(headers, "x-localecode").unwrap_or_else(|| "en-us".into()),
        device_token: header_value(headers, "x-user-device-token").unwrap_or_default(),
        brand_variation: header_value(headers, "x-brand-variation").unwrap_or_default(),
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
