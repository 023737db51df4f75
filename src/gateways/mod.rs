// 上游服务网关
// 区域搜索、reaction、成就、通知、指标、用户位置历史都是外部服务，
// 这里只按边界契约消费，不拥有任何数据

pub mod http;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::middleware::RequestContext;
use crate::models::{ActivationRecord, Area, AreaKind, GeoPoint, UserLocationRecord};

pub use http::HttpUpstreamGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("上游请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("上游返回错误状态: {0}")]
    Status(reqwest::StatusCode),
}

/// 空间指标名称（visited=用户在边缘/被动经过，prospected=更靠近内部）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceMetricName {
    Visit,
    Prospect,
}

impl SpaceMetricName {
    pub fn wire_name(&self) -> &'static str {
        match self {
            SpaceMetricName::Visit => "SPACE_VISIT",
            SpaceMetricName::Prospect => "SPACE_PROSPECT",
        }
    }
}

/// 应用内通知创建请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub is_unread: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association_id: Option<String>,
    pub message_locale_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_params: Option<Value>,
}

/// 上游HTTP调用的统一接口，测试用内存假实现替换
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    /// 搜索用户连接范围内、指定点附近的区域
    async fn search_areas(
        &self,
        ctx: &RequestContext,
        kind: AreaKind,
        location: &GeoPoint,
        distance_override_meters: f64,
    ) -> Result<Vec<Area>, GatewayError>;

    /// 批量查询激活记录
    async fn find_reactions(
        &self,
        ctx: &RequestContext,
        kind: AreaKind,
        area_ids: &[String],
    ) -> Result<Vec<ActivationRecord>, GatewayError>;

    /// 批量标记 userHasActivated=true
    async fn create_activation_reactions(
        &self,
        ctx: &RequestContext,
        kind: AreaKind,
        area_ids: &[String],
    ) -> Result<(), GatewayError>;

    /// 累计成就进度
    async fn update_achievements(
        &self,
        ctx: &RequestContext,
        achievement_class: &str,
        achievement_tier: &str,
        progress_count: usize,
    ) -> Result<(), GatewayError>;

    /// 创建应用内通知，返回的记录用于装饰推送载荷
    async fn create_notification(
        &self,
        ctx: &RequestContext,
        request: CreateNotificationRequest,
    ) -> Result<Value, GatewayError>;

    /// 批量上报空间位置质量指标
    async fn send_space_metric(
        &self,
        ctx: &RequestContext,
        name: SpaceMetricName,
        space_ids: &[String],
        location: &GeoPoint,
    ) -> Result<(), GatewayError>;

    /// 更新用户的最近已知位置
    async fn update_last_known_location(
        &self,
        ctx: &RequestContext,
        location: &GeoPoint,
    ) -> Result<(), GatewayError>;

    /// 拉取用户的完整位置历史
    async fn get_user_locations(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<UserLocationRecord>, GatewayError>;

    /// 在某条位置记录上记下签到推送的发送时间
    async fn mark_check_in_push_sent(
        &self,
        ctx: &RequestContext,
        location_id: &str,
        sent_at_ms: i64,
    ) -> Result<(), GatewayError>;
}
