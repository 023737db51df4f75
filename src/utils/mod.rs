use axum::Json;
use serde::Serialize;

/// 统一的API响应信封
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    pub resp_data: Option<T>,
}

// 所有 handler 的成功路径都走这个信封
pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
}

/// 派生一个后台任务：错误只记录日志，绝不传播给调用方
/// 激活、通知、指标等旁路写入都走这里
pub fn spawn_logged<F, E>(source: &'static str, fut: F)
where
    F: std::future::Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Display,
{
    tokio::spawn(async move {
        if let Err(err) = fut.await {
            tracing::error!(source = source, error = %err, "后台任务失败");
        }
    });
}
