use std::collections::HashMap;

use crate::models::Area;

/// 未激活区域的缓存快照
/// 以redis哈希的字符串字段存取，保留激活判定所需的全部反规范化属性
#[derive(Debug, Clone, PartialEq)]
pub struct CachedArea {
    pub id: String,
    pub from_user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub max_proximity: f64,
    pub does_require_proximity_view: bool,
    pub is_public: bool,
    pub category: Option<String>,
    pub notification_msg: Option<String>,
    pub max_views: Option<i64>,
}

impl CachedArea {
    /// 序列化为哈希字段列表，供 HSET 使用
    pub fn to_hash_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".into(), self.id.clone()),
            ("fromUserId".into(), self.from_user_id.clone()),
            ("latitude".into(), self.latitude.to_string()),
            ("longitude".into(), self.longitude.to_string()),
            ("radius".into(), self.radius.to_string()),
            ("maxProximity".into(), self.max_proximity.to_string()),
            (
                "doesRequireProximityToView".into(),
                self.does_require_proximity_view.to_string(),
            ),
            ("isPublic".into(), self.is_public.to_string()),
        ];
        if let Some(category) = &self.category {
            fields.push(("category".into(), category.clone()));
        }
        if let Some(msg) = &self.notification_msg {
            fields.push(("notificationMsg".into(), msg.clone()));
        }
        if let Some(max_views) = self.max_views {
            fields.push(("maxViews".into(), max_views.to_string()));
        }
        fields
    }

    /// 从 HGETALL 的结果还原快照；缺少必需字段（快照已过期）返回 None
    pub fn from_hash_fields(fields: &HashMap<String, String>) -> Option<Self> {
        let id = fields.get("id")?.clone();
        let latitude = fields.get("latitude")?.parse().ok()?;
        let longitude = fields.get("longitude")?.parse().ok()?;

        Some(Self {
            id,
            from_user_id: fields.get("fromUserId").cloned().unwrap_or_default(),
            latitude,
            longitude,
            radius: parse_or_default(fields, "radius"),
            max_proximity: parse_or_default(fields, "maxProximity"),
            does_require_proximity_view: fields
                .get("doesRequireProximityToView")
                .map(|v| v == "true")
                .unwrap_or(false),
            is_public: fields.get("isPublic").map(|v| v == "true").unwrap_or(false),
            category: fields.get("category").cloned(),
            notification_msg: fields.get("notificationMsg").cloned(),
            max_views: fields.get("maxViews").and_then(|v| v.parse().ok()),
        })
    }
}

fn parse_or_default(fields: &HashMap<String, String>, key: &str) -> f64 {
    fields
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

impl From<&Area> for CachedArea {
    fn from(area: &Area) -> Self {
        Self {
            id: area.id.clone(),
            from_user_id: area.from_user_id.clone(),
            latitude: area.latitude,
            longitude: area.longitude,
            radius: area.radius,
            max_proximity: area.max_proximity,
            does_require_proximity_view: area.does_require_proximity_view,
            is_public: area.is_public,
            category: area.category.clone(),
            notification_msg: area.notification_msg.clone(),
            max_views: area.max_views,
        }
    }
}

impl From<CachedArea> for Area {
    fn from(cached: CachedArea) -> Self {
        Self {
            id: cached.id,
            from_user_id: cached.from_user_id,
            latitude: cached.latitude,
            longitude: cached.longitude,
            radius: cached.radius,
            max_proximity: cached.max_proximity,
            does_require_proximity_view: cached.does_require_proximity_view,
            is_public: cached.is_public,
            category: cached.category,
            notification_msg: cached.notification_msg,
            max_views: cached.max_views,
        }
    }
}
