use serde::{Deserialize, Serialize};

use crate::location::constants::AREA_PROXIMITY_EXPANDED_METERS;
use crate::push::PushNotificationType;

/// 区域类型（moment 或 space）
/// 两种类型共享同一条处理管线，差异集中在这里的常量方法上
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaKind {
    Moment,
    Space,
}

impl AreaKind {
    pub const ALL: [AreaKind; 2] = [AreaKind::Moment, AreaKind::Space];

    /// 复数形式，用于上游搜索路由和缓存键
    pub fn plural(&self) -> &'static str {
        match self {
            AreaKind::Moment => "moments",
            AreaKind::Space => "spaces",
        }
    }

    /// 单数形式，用于 reaction 服务路由
    pub fn singular(&self) -> &'static str {
        match self {
            AreaKind::Moment => "moment",
            AreaKind::Space => "space",
        }
    }

    /// reaction 批量接口的 id 字段名
    pub fn reaction_ids_field(&self) -> &'static str {
        match self {
            AreaKind::Moment => "momentIds",
            AreaKind::Space => "spaceIds",
        }
    }

    /// 全量拉取时的搜索半径
    /// spaces 用一半半径，避免小商户签到刷满用户的信息流
    pub fn search_radius_meters(&self) -> f64 {
        match self {
            AreaKind::Moment => AREA_PROXIMITY_EXPANDED_METERS,
            AreaKind::Space => AREA_PROXIMITY_EXPANDED_METERS / 2.0,
        }
    }

    /// 激活时累计的成就档位（explorer 成就类）
    pub fn achievement_tier(&self) -> &'static str {
        match self {
            AreaKind::Moment => "1_4",
            AreaKind::Space => "1_5",
        }
    }

    /// 需要手动查看的区域对应的应用内通知类型
    pub fn discovered_unique_notification_type(&self) -> &'static str {
        match self {
            AreaKind::Moment => "DISCOVERED_UNIQUE_MOMENT",
            AreaKind::Space => "DISCOVERED_UNIQUE_SPACE",
        }
    }

    pub fn discovered_unique_message_key(&self) -> &'static str {
        match self {
            AreaKind::Moment => "notifications.discoveredUniqueMoment",
            AreaKind::Space => "notifications.discoveredUniqueSpace",
        }
    }

    pub fn proximity_required_push_type(&self) -> PushNotificationType {
        match self {
            AreaKind::Moment => PushNotificationType::ProximityRequiredMoment,
            AreaKind::Space => PushNotificationType::ProximityRequiredSpace,
        }
    }
}

/// 区域（本子系统只读，不负责编辑）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    pub id: String,
    pub from_user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// 激活半径（米）
    #[serde(default)]
    pub radius: f64,
    /// 半径之外的额外激活余量（米）
    #[serde(default)]
    pub max_proximity: f64,
    /// true 表示需要用户手动查看，不允许静默自动激活
    /// 线上的字段名带"To"，不能漏
    #[serde(
        default,
        rename = "doesRequireProximityToView",
        alias = "doesRequireProximityView"
    )]
    pub does_require_proximity_view: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notification_msg: Option<String>,
    #[serde(default)]
    pub max_views: Option<i64>,
}

impl Area {
    /// 自动激活所需的总距离（米）
    pub fn required_proximity_meters(&self) -> f64 {
        self.radius + self.max_proximity
    }
}

/// 激活记录，由外部 reaction 服务持有
/// 本子系统创建/更新该记录，但不拥有它
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRecord {
    #[serde(default)]
    pub moment_id: Option<String>,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub user_has_activated: bool,
    #[serde(default)]
    pub user_has_liked: bool,
    #[serde(default)]
    pub user_has_super_liked: bool,
}

impl ActivationRecord {
    pub fn area_id(&self, kind: AreaKind) -> Option<&str> {
        match kind {
            AreaKind::Moment => self.moment_id.as_deref(),
            AreaKind::Space => self.space_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_view_flag_uses_the_to_spelling_on_the_wire() {
        // 上游字段名是 doesRequireProximityToView；丢掉"To"会让
        // 手动查看区域被当成普通区域静默自动激活
        let area: Area = serde_json::from_str(
            r#"{
                "id": "a1",
                "fromUserId": "owner",
                "latitude": 37.0,
                "longitude": -122.0,
                "radius": 50.0,
                "maxProximity": 10.0,
                "doesRequireProximityToView": true
            }"#,
        )
        .unwrap();

        assert!(area.does_require_proximity_view);

        let json = serde_json::to_value(&area).unwrap();
        assert_eq!(json["doesRequireProximityToView"], true);
        assert!(json.get("doesRequireProximityView").is_none());
    }

    #[test]
    fn manual_view_flag_accepts_the_legacy_spelling() {
        let area: Area = serde_json::from_str(
            r#"{
                "id": "a1",
                "fromUserId": "owner",
                "latitude": 37.0,
                "longitude": -122.0,
                "doesRequireProximityView": true
            }"#,
        )
        .unwrap();

        assert!(area.does_require_proximity_view);
    }
}
