use chrono::Utc;
use serde_json::json;

use crate::AppState;
use crate::gateways::{CreateNotificationRequest, SpaceMetricName};
use crate::location::constants::{
    AREA_PROXIMITY_METERS, MAX_AREAS_IN_PUSH_PAYLOAD, MAX_AREA_ACTIVATE_COUNT,
};
use crate::location::{NotificationWindow, distance_meters, has_sent_notification_recently};
use crate::middleware::RequestContext;
use crate::models::{Area, AreaKind, GeoPoint};
use crate::push::{PushMessageConfig, PushNotificationType, compose_message};
use crate::utils::spawn_logged;

/// explorer 成就类，按类型区分档位
const ACHIEVEMENT_CLASS_EXPLORER: &str = "explorer";

/// 本次位置更新的激活选择结果
#[derive(Debug, Default)]
pub struct ActivationSelection {
    pub spaces: Vec<Area>,
    pub moments: Vec<Area>,
    /// 达标但超出总上限的区域，写回缓存而不是丢弃
    pub overflow_spaces: Vec<Area>,
    pub overflow_moments: Vec<Area>,
}

impl ActivationSelection {
    pub fn total(&self) -> usize {
        self.spaces.len() + self.moments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// 响应里返回的已激活区域，spaces优先
    pub fn response_areas(&self) -> Vec<Area> {
        self.spaces
            .iter()
            .chain(self.moments.iter())
            .cloned()
            .collect()
    }
}

/// 在总上限内选择要激活的区域
/// spaces优先：它们是被认领的商户位置，互动价值更高；moments填充剩余名额
pub fn select_areas_to_activate(moments: Vec<Area>, spaces: Vec<Area>) -> ActivationSelection {
    let mut selection = ActivationSelection::default();

    for space in spaces {
        if selection.spaces.len() < MAX_AREA_ACTIVATE_COUNT {
            selection.spaces.push(space);
        } else {
            selection.overflow_spaces.push(space);
        }
    }

    let remaining = MAX_AREA_ACTIVATE_COUNT - selection.spaces.len();
    for (index, moment) in moments.into_iter().enumerate() {
        if index < remaining {
            selection.moments.push(moment);
        } else {
            selection.overflow_moments.push(moment);
        }
    }

    selection
}

/// 提交激活并视节流状态发聚合通知
///
/// 整个函数相对HTTP响应是后台执行的。内部顺序必须保持：
/// reaction写入 -> 缓存移除 -> 通知检查，避免同一轮里重复通知。
/// 任何上游失败都只记录日志，不中断后续步骤。
pub async fn activate_areas_and_notify(
    state: AppState,
    ctx: RequestContext,
    selection: ActivationSelection,
    location: GeoPoint,
) {
    // 超出上限的区域写回缓存，等下一轮更新浮出
    if !selection.overflow_spaces.is_empty() {
        state
            .store
            .add_areas(AreaKind::Space, &ctx.user_id, &selection.overflow_spaces)
            .await;
    }
    if !selection.overflow_moments.is_empty() {
        state
            .store
            .add_areas(AreaKind::Moment, &ctx.user_id, &selection.overflow_moments)
            .await;
    }

    if selection.is_empty() {
        return;
    }

    for (kind, areas) in [
        (AreaKind::Space, &selection.spaces),
        (AreaKind::Moment, &selection.moments),
    ] {
        if areas.is_empty() {
            continue;
        }
        let area_ids: Vec<String> = areas.iter().map(|area| area.id.clone()).collect();

        // reaction写入先于缓存移除：写失败的区域下一轮还会被重新供给（幂等重试）
        if let Err(err) = state
            .upstream
            .create_activation_reactions(&ctx, kind, &area_ids)
            .await
        {
            tracing::error!(
                user_id = %ctx.user_id,
                kind = kind.plural(),
                area_ids = ?area_ids,
                error = %err,
                "区域激活写入失败"
            );
        }

        {
            let upstream = state.upstream.clone();
            let ctx = ctx.clone();
            let count = area_ids.len();
            spawn_logged("update_achievements", async move {
                upstream
                    .update_achievements(
                        &ctx,
                        ACHIEVEMENT_CLASS_EXPLORER,
                        kind.achievement_tier(),
                        count,
                    )
                    .await
            });
        }

        // 每种类型各自对自己的命名空间移除，不能交叉
        state
            .store
            .remove_areas(kind, &ctx.user_id, &area_ids)
            .await;
    }

    send_space_visit_metrics(&state, &ctx, &selection.spaces, &location);

    // reaction写入已落定，重读两种类型的通知时间再决定是否发聚合通知
    let last_moment_ms = state
        .store
        .get_last_notification_date(AreaKind::Moment, &ctx.user_id)
        .await;
    let last_space_ms = state
        .store
        .get_last_notification_date(AreaKind::Space, &ctx.user_id)
        .await;
    let now_ms = Utc::now().timestamp_millis();

    // 聚合通知要么全发要么不发，任一类型刚通知过就整体跳过
    if has_sent_notification_recently(last_moment_ms, now_ms, NotificationWindow::Generic)
        || has_sent_notification_recently(last_space_ms, now_ms, NotificationWindow::Generic)
    {
        return;
    }

    let activated_moment_ids: Vec<&str> =
        selection.moments.iter().map(|a| a.id.as_str()).collect();
    let activated_space_ids: Vec<&str> =
        selection.spaces.iter().map(|a| a.id.as_str()).collect();

    let notification_data = match state
        .upstream
        .create_notification(
            &ctx,
            CreateNotificationRequest {
                user_id: ctx.user_id.clone(),
                notification_type: "NEW_AREAS_ACTIVATED".into(),
                is_unread: true,
                association_id: None,
                message_locale_key: "notifications.newAreasActivated".into(),
                message_params: Some(json!({
                    "activatedMomentIds": activated_moment_ids,
                    "activatedSpaceIds": activated_space_ids,
                    "totalAreasActivated": selection.total(),
                })),
            },
        )
        .await
    {
        Ok(data) => data,
        Err(err) => {
            tracing::error!(
                user_id = %ctx.user_id,
                error = %err,
                "创建聚合激活通知失败"
            );
            json!({})
        }
    };

    // 推送载荷只带(kind, id)对并截断，避免超出提供商的载荷上限
    let areas_activated: Vec<_> = selection
        .spaces
        .iter()
        .map(|a| json!({ "kind": AreaKind::Space.singular(), "id": a.id }))
        .chain(
            selection
                .moments
                .iter()
                .map(|a| json!({ "kind": AreaKind::Moment.singular(), "id": a.id })),
        )
        .take(MAX_AREAS_IN_PUSH_PAYLOAD)
        .collect();

    let message = compose_message(
        PushNotificationType::NewAreasActivated,
        json!({
            "areasActivated": areas_activated,
            "notificationData": notification_data,
        }),
        &PushMessageConfig {
            device_token: ctx.device_token.clone(),
            user_id: ctx.user_id.clone(),
            locale: ctx.locale.clone(),
            total_areas_activated: Some(selection.total()),
        },
    );
    if let Some(message) = message {
        if let Err(err) = state.push.send(message).await {
            tracing::error!(user_id = %ctx.user_id, error = %err, "聚合激活推送发送失败");
        }
    }

    // 刷新两种类型的节流时间，维持冷却窗口
    state
        .store
        .set_last_notification_date(AreaKind::Moment, &ctx.user_id)
        .await;
    state
        .store
        .set_last_notification_date(AreaKind::Space, &ctx.user_id)
        .await;
}

/// 空间的位置质量指标：在边缘/外侧算visited（被动经过），更靠内算prospected
fn send_space_visit_metrics(
    state: &AppState,
    ctx: &RequestContext,
    spaces: &[Area],
    location: &GeoPoint,
) {
    if spaces.is_empty() {
        return;
    }

    let mut visited_ids: Vec<String> = Vec::new();
    let mut prospected_ids: Vec<String> = Vec::new();
    for space in spaces {
        let distance_from_space = distance_meters(
            location.longitude,
            location.latitude,
            space.longitude,
            space.latitude,
        );
        if distance_from_space > AREA_PROXIMITY_METERS - 1.0 {
            visited_ids.push(space.id.clone());
        } else {
            prospected_ids.push(space.id.clone());
        }
    }

    for (name, ids) in [
        (SpaceMetricName::Visit, visited_ids),
        (SpaceMetricName::Prospect, prospected_ids),
    ] {
        if ids.is_empty() {
            continue;
        }
        let upstream = state.upstream.clone();
        let ctx = ctx.clone();
        let location = *location;
        spawn_logged("send_space_metric", async move {
            upstream
                .send_space_metric(&ctx, name, &ids, &location)
                .await
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(id: &str) -> Area {
        Area {
            id: id.into(),
            from_user_id: "owner".into(),
            latitude: 37.0,
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

    fn areas(prefix: &str, count: usize) -> Vec<Area> {
        (0..count).map(|i| area(&format!("{}{}", prefix, i))).collect()
    }

    #[test]
    fn spaces_fill_the_cap_first() {
        let selection = select_areas_to_activate(areas("m", 3), areas("s", MAX_AREA_ACTIVATE_COUNT));

        assert_eq!(selection.spaces.len(), MAX_AREA_ACTIVATE_COUNT);
        assert!(selection.moments.is_empty());
        // 溢出的moments进缓存而不是被丢掉
        assert_eq!(selection.overflow_moments.len(), 3);
        assert!(selection.overflow_spaces.is_empty());
    }

    #[test]
    fn moments_fill_remaining_slots() {
        let selection = select_areas_to_activate(areas("m", 4), areas("s", 2));

        assert_eq!(selection.spaces.len(), 2);
        assert_eq!(selection.moments.len(), MAX_AREA_ACTIVATE_COUNT - 2);
        assert_eq!(selection.overflow_moments.len(), 4 - (MAX_AREA_ACTIVATE_COUNT - 2));
    }

    #[test]
    fn excess_spaces_overflow() {
        let selection =
            select_areas_to_activate(Vec::new(), areas("s", MAX_AREA_ACTIVATE_COUNT + 2));

        assert_eq!(selection.spaces.len(), MAX_AREA_ACTIVATE_COUNT);
        assert_eq!(selection.overflow_spaces.len(), 2);
    }

    #[test]
    fn response_lists_spaces_before_moments() {
        let selection = select_areas_to_activate(areas("m", 1), areas("s", 1));
        let response = selection.response_areas();

        assert_eq!(response.len(), 2);
        assert_eq!(response[0].id, "s0");
        assert_eq!(response[1].id, "m0");
    }
}
