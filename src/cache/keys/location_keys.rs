use crate::models::AreaKind;

/// 存放 origin、lastNotificationDateMs 等元数据的哈希键
pub fn areas_key(kind: AreaKind, user_id: &str) -> String {
    format!("user:{}:nearby-{}", user_id, kind.plural())
}

/// 未激活区域的GEO索引键
pub fn areas_geo_key(kind: AreaKind, user_id: &str) -> String {
    format!("user:{}:nearby-{}-geo", user_id, kind.plural())
}

/// 单个未激活区域的快照哈希键
pub fn unactivated_area_key(kind: AreaKind, user_id: &str, area_id: &str) -> String {
    format!("{}:unactivated:{}", areas_geo_key(kind, user_id), area_id)
}

/// 最大激活距离的字符串键
pub fn max_activation_distance_key(kind: AreaKind, user_id: &str) -> String {
    format!("{}:max-activation-distance", areas_key(kind, user_id))
}

/// origin 哈希字段名
pub const ORIGIN_FIELD: &str = "origin";

/// 最近一次通知时间的哈希字段名
pub const LAST_NOTIFICATION_DATE_FIELD: &str = "lastNotificationDateMs";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_user_and_kind() {
        assert_eq!(areas_key(AreaKind::Moment, "u1"), "user:u1:nearby-moments");
        assert_eq!(areas_key(AreaKind::Space, "u1"), "user:u1:nearby-spaces");
        assert_eq!(
            areas_geo_key(AreaKind::Space, "u1"),
            "user:u1:nearby-spaces-geo"
        );
        assert_eq!(
            unactivated_area_key(AreaKind::Moment, "u1", "a9"),
            "user:u1:nearby-moments-geo:unactivated:a9"
        );
    }
}
