use std::collections::HashSet;

use chrono::Utc;
use serde_json::json;

use crate::AppState;
use crate::gateways::CreateNotificationRequest;
use crate::location::constants::{AREA_PROXIMITY_METERS, MAX_AREA_ACTIVATE_COUNT};
use crate::location::{NotificationWindow, distance_meters, has_sent_notification_recently};
use crate::middleware::RequestContext;
use crate::models::{Area, AreaKind, GeoPoint};
use crate::push::{PushMessageConfig, compose_message};

/// 一批候选区域的划分结果
#[derive(Debug, Default)]
pub struct CandidatePartition {
    /// 距离达标且未超过单次激活上限，可立即自动激活
    pub activatable: Vec<Area>,
    /// 距离不够或超过上限，写回缓存等待后续更新
    pub cacheable: Vec<Area>,
    /// 需要手动查看的区域，本轮最多通知一个
    pub manual_notify: Option<Area>,
    /// 本批候选观察到的最大激活距离（含历史基准）
    pub max_activation_distance: f64,
}

/// 用户是否进入了区域的激活范围
/// expansion_tolerance 是全局容差，用于补偿GPS抖动和灰度放量
pub fn can_activate_area(
    area: &Area,
    user_location: &GeoPoint,
    expansion_tolerance_meters: f64,
) -> bool {
    let dist_to_center = distance_meters(
        area.longitude,
        area.latitude,
        user_location.longitude,
        user_location.latitude,
    );

    dist_to_center - area.required_proximity_meters() <= expansion_tolerance_meters
}

/// 纯划分逻辑：不触发任何IO
///
/// 已激活的区域直接丢弃；需要手动查看的区域永不自动激活，
/// 在通知窗口允许时挑出第一个用于单发通知。
pub fn partition_candidates(
    areas: Vec<Area>,
    activated_ids: &HashSet<String>,
    user_location: &GeoPoint,
    expansion_tolerance_meters: f64,
    should_skip_notification: bool,
) -> CandidatePartition {
    let mut partition = CandidatePartition {
        max_activation_distance: AREA_PROXIMITY_METERS,
        ..Default::default()
    };
    let mut skip_notification = should_skip_notification;

    for area in areas {
        // 对所有候选取最大值（而不只是幸存者），保证后续纯缓存查询不漏候选
        partition.max_activation_distance = partition
            .max_activation_distance
            .max(area.required_proximity_meters());

        let user_is_close_enough =
            can_activate_area(&area, user_location, expansion_tolerance_meters);

        if area.does_require_proximity_view {
            if !skip_notification {
                partition.manual_notify = Some(area);
                skip_notification = true;
            }
            // 无论是否通知，都不进入自动激活和缓存
            continue;
        }

        if activated_ids.contains(&area.id) {
            continue;
        }

        if user_is_close_enough && partition.activatable.len() < MAX_AREA_ACTIVATE_COUNT {
            partition.activatable.push(area);
        } else {
            // 超过上限的达标区域也写回缓存，等前面的激活消耗掉后再浮出
            partition.cacheable.push(area);
        }
    }

    partition
}

/// 过滤一批候选区域：批量拉取激活记录，划分，落缓存，返回可激活集合
pub async fn filter_nearby_areas(
    state: &AppState,
    ctx: &RequestContext,
    kind: AreaKind,
    areas: Vec<Area>,
    user_location: &GeoPoint,
) -> Vec<Area> {
    if areas.is_empty() {
        return Vec::new();
    }

    let area_ids: Vec<String> = areas.iter().map(|area| area.id.clone()).collect();
    let reactions = match state.upstream.find_reactions(ctx, kind, &area_ids).await {
        Ok(reactions) => reactions,
        Err(err) => {
            tracing::error!(
                user_id = %ctx.user_id,
                kind = kind.plural(),
                error = %err,
                "拉取激活记录失败，按无记录处理"
            );
            Vec::new()
        }
    };
    let activated_ids: HashSet<String> = reactions
        .iter()
        .filter(|reaction| reaction.user_has_activated)
        .filter_map(|reaction| reaction.area_id(kind).map(str::to_string))
        .collect();

    let last_notification_ms = state
        .store
        .get_last_notification_date(kind, &ctx.user_id)
        .await;
    let should_skip_notification = has_sent_notification_recently(
        last_notification_ms,
        Utc::now().timestamp_millis(),
        NotificationWindow::Generic,
    );

    let partition = partition_candidates(
        areas,
        &activated_ids,
        user_location,
        state.config.location_expansion_meters,
        should_skip_notification,
    );

    if let Some(area) = &partition.manual_notify {
        // 节流时间先落缓存，通知本身走后台任务
        state
            .store
            .set_last_notification_date(kind, &ctx.user_id)
            .await;
        notify_manual_area(state, ctx, kind, area.clone());
    }

    // 最大激活距离只抬不降
    let current_max = state
        .store
        .get_max_activation_distance(kind, &ctx.user_id)
        .await
        .unwrap_or(0.0);
    state
        .store
        .set_max_activation_distance(
            kind,
            &ctx.user_id,
            current_max.max(partition.max_activation_distance),
        )
        .await;

    if !partition.cacheable.is_empty() {
        state
            .store
            .add_areas(kind, &ctx.user_id, &partition.cacheable)
            .await;
    }

    partition.activatable
}

/// 针对单个"需手动查看"区域发应用内通知和推送，错误只记录日志
fn notify_manual_area(state: &AppState, ctx: &RequestContext, kind: AreaKind, area: Area) {
    let upstream = state.upstream.clone();
    let push = state.push.clone();
    let ctx = ctx.clone();

    tokio::spawn(async move {
        let notification_data = match upstream
            .create_notification(
                &ctx,
                CreateNotificationRequest {
                    user_id: ctx.user_id.clone(),
                    notification_type: kind.discovered_unique_notification_type().into(),
                    is_unread: true,
                    association_id: Some(area.id.clone()),
                    message_locale_key: kind.discovered_unique_message_key().into(),
                    message_params: None,
                },
            )
            .await
        {
            Ok(data) => data,
            Err(err) => {
                tracing::error!(
                    user_id = %ctx.user_id,
                    area_id = %area.id,
                    error = %err,
                    "创建独特区域通知失败"
                );
                json!({})
            }
        };

        let message = compose_message(
            kind.proximity_required_push_type(),
            json!({ "area": area, "notificationData": notification_data }),
            &PushMessageConfig {
                device_token: ctx.device_token.clone(),
                user_id: ctx.user_id.clone(),
                locale: ctx.locale.clone(),
                total_areas_activated: None,
            },
        );
        if let Some(message) = message {
            if let Err(err) = push.send(message).await {
                tracing::error!(
                    user_id = %ctx.user_id,
                    area_id = %area.id,
                    error = %err,
                    "独特区域推送发送失败"
                );
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(id: &str, lat_offset_m: f64) -> Area {
        // 纬度1度约111,195米
        Area {
            id: id.into(),
            from_user_id: "owner".into(),
            latitude: 37.0 + lat_offset_m / 111_195.0,
            longitude: -122.0,
            radius: 50.0,
            max_proximity: 10.0,
            does_require_proximity_view: false,
            is_public: true,
            category: None,
            notification_msg: None,
            max_views: None,
        }
    }

    fn user() -> GeoPoint {
        GeoPoint {
            latitude: 37.0,
            longitude: -122.0,
        }
    }

    #[test]
    fn close_enough_at_boundary() {
        // 半径50 + 余量10：55米处可激活，65米处不可
        let near = area("near", 55.0);
        let far = area("far", 65.0);

        assert!(can_activate_area(&near, &user(), 0.0));
        assert!(!can_activate_area(&far, &user(), 0.0));
    }

    #[test]
    fn expansion_tolerance_widens_boundary() {
        let edge = area("edge", 65.0);
        assert!(!can_activate_area(&edge, &user(), 0.0));
        assert!(can_activate_area(&edge, &user(), 10.0));
    }

    #[test]
    fn already_activated_areas_are_dropped() {
        let activated: HashSet<String> = ["a1".to_string()].into_iter().collect();
        let partition = partition_candidates(
            vec![area("a1", 0.0), area("a2", 0.0)],
            &activated,
            &user(),
            0.0,
            false,
        );

        assert_eq!(partition.activatable.len(), 1);
        assert_eq!(partition.activatable[0].id, "a2");
        assert!(partition.cacheable.is_empty());
    }

    #[test]
    fn manual_areas_never_auto_activate() {
        let mut manual = area("m1", 0.0);
        manual.does_require_proximity_view = true;
        let mut manual2 = area("m2", 0.0);
        manual2.does_require_proximity_view = true;

        let partition =
            partition_candidates(vec![manual, manual2], &HashSet::new(), &user(), 0.0, false);

        assert!(partition.activatable.is_empty());
        assert!(partition.cacheable.is_empty());
        // 一轮最多挑一个发通知
        assert_eq!(partition.manual_notify.as_ref().map(|a| a.id.as_str()), Some("m1"));
    }

    #[test]
    fn manual_notification_respects_throttle() {
        let mut manual = area("m1", 0.0);
        manual.does_require_proximity_view = true;

        let partition =
            partition_candidates(vec![manual], &HashSet::new(), &user(), 0.0, true);

        assert!(partition.manual_notify.is_none());
    }

    #[test]
    fn far_areas_go_to_cacheable() {
        let partition = partition_candidates(
            vec![area("near", 10.0), area("far", 500.0)],
            &HashSet::new(),
            &user(),
            0.0,
            false,
        );

        assert_eq!(partition.activatable.len(), 1);
        assert_eq!(partition.cacheable.len(), 1);
        assert_eq!(partition.cacheable[0].id, "far");
    }

    #[test]
    fn activation_cap_pushes_overflow_to_cache() {
        let areas: Vec<Area> = (0..MAX_AREA_ACTIVATE_COUNT + 3)
            .map(|i| area(&format!("a{}", i), 0.0))
            .collect();

        let partition = partition_candidates(areas, &HashSet::new(), &user(), 0.0, false);

        assert_eq!(partition.activatable.len(), MAX_AREA_ACTIVATE_COUNT);
        assert_eq!(partition.cacheable.len(), 3);
    }

    #[test]
    fn max_activation_distance_covers_all_candidates() {
        let mut big = area("big", 500.0);
        big.radius = 300.0;
        big.max_proximity = 40.0;

        let partition = partition_candidates(
            vec![area("small", 0.0), big],
            &HashSet::new(),
            &user(),
            0.0,
            false,
        );

        // 远处的大区域虽然进不了激活集合，其边界仍然抬升最大激活距离
        assert_eq!(partition.max_activation_distance, 340.0);
    }

    #[test]
    fn max_activation_distance_never_below_baseline() {
        let mut tiny = area("tiny", 0.0);
        tiny.radius = 5.0;
        tiny.max_proximity = 0.0;

        let partition =
            partition_candidates(vec![tiny], &HashSet::new(), &user(), 0.0, false);

        assert_eq!(partition.max_activation_distance, AREA_PROXIMITY_METERS);
    }
}
