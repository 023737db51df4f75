use serde::{Deserialize, Serialize};

/// 经纬度坐标点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// 用户历史位置记录（由用户服务持有）
/// 家庭住址的识别是上游的职责，这里只读取 is_declared_home
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocationRecord {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub visit_count: i64,
    #[serde(default)]
    pub is_declared_home: bool,
    #[serde(default)]
    pub last_push_notification_sent_ms: Option<i64>,
}

impl UserLocationRecord {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}
