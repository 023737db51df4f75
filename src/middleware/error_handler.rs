use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};

// 读出来再放回去的body上限；错误体都是小JSON
const MAX_LOGGED_BODY_BYTES: usize = 1024;

/// 把5xx响应体记进日志，位置管线的失败大多发生在后台任务里，
/// 这里只兜住同步路径上漏出来的那部分
pub async fn log_errors(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(%method, path, error = %err, "failed to read error response body");
            return Response::from_parts(parts, Body::empty());
        }
    };

    tracing::error!(
        %method,
        path,
        status = %parts.status,
        body = %String::from_utf8_lossy(&bytes),
        "server error response"
    );

    // body被消费过，重建前去掉旧的长度头
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
