use std::cmp::Ordering;

use chrono::Utc;
use serde_json::json;

use crate::AppState;
use crate::location::constants::MAX_DISTANCE_TO_CHECK_IN_METERS;
use crate::location::{
    NotificationWindow, distance_between, distance_meters, has_sent_notification_recently,
};
use crate::middleware::RequestContext;
use crate::models::{Area, GeoPoint, UserLocationRecord};
use crate::push::{PushMessageConfig, PushNotificationType, compose_message};
use crate::utils::spawn_logged;

/// 推送里最多附带的候选空间数（最近一个 + 至多3个备选）
const MAX_ALTERNATE_SPACES: usize = 3;

/// 按距离升序收集"可能正在访问"的空间
/// 越过签到距离的第一个空间也收进来，用来锚定一个有意义的边界
pub fn shortlist_possible_visits(spaces: Vec<Area>, location: &GeoPoint) -> Vec<(Area, f64)> {
    let mut with_distance: Vec<(Area, f64)> = spaces
        .into_iter()
        .map(|area| {
            let distance = distance_meters(
                area.longitude,
                area.latitude,
                location.longitude,
                location.latitude,
            );
            (area, distance)
        })
        .collect();
    with_distance.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut shortlist = Vec::new();
    for (area, distance) in with_distance {
        let exceeds_check_in_distance = distance > MAX_DISTANCE_TO_CHECK_IN_METERS;
        shortlist.push((area, distance));
        if exceeds_check_in_distance {
            break;
        }
    }
    shortlist
}

/// 选出当前正在跟踪的位置记录：
/// 排除已声明的家庭住址，按访问次数降序，取第一个在签到距离内的
pub fn pick_tracked_location(
    records: Vec<UserLocationRecord>,
    location: &GeoPoint,
) -> Option<UserLocationRecord> {
    let mut non_home: Vec<UserLocationRecord> = records
        .into_iter()
        .filter(|record| !record.is_declared_home)
        .collect();
    non_home.sort_by(|a, b| b.visit_count.cmp(&a.visit_count));

    non_home
        .into_iter()
        .find(|record| distance_between(&record.point(), location) <= MAX_DISTANCE_TO_CHECK_IN_METERS)
}

/// 后台静止定位专用：推断用户最可能正在访问的空间并发互动提醒
/// 与标准激活管线互不影响，同一请求里两者都可能触发
pub async fn process_possible_visit(
    state: &AppState,
    ctx: &RequestContext,
    location: &GeoPoint,
    filtered_spaces: Vec<Area>,
) {
    if filtered_spaces.is_empty() {
        return;
    }

    let records = match state.upstream.get_user_locations(ctx).await {
        Ok(records) => records,
        Err(err) => {
            tracing::error!(
                user_id = %ctx.user_id,
                error = %err,
                "拉取位置历史失败，跳过访店判定"
            );
            return;
        }
    };

    // 没有可锚定节流时间的记录就不发，避免无法限频的推送
    let Some(tracked) = pick_tracked_location(records, location) else {
        tracing::debug!(user_id = %ctx.user_id, "附近没有被跟踪的位置记录");
        return;
    };

    let shortlist = shortlist_possible_visits(filtered_spaces, location);
    if shortlist.is_empty() {
        return;
    }

    let now_ms = Utc::now().timestamp_millis();
    if has_sent_notification_recently(
        tracked.last_push_notification_sent_ms,
        now_ms,
        NotificationWindow::CheckIn,
    ) {
        return;
    }

    let nearest = &shortlist[0].0;
    let alternate_ids: Vec<&str> = shortlist
        .iter()
        .skip(1)
        .take(MAX_ALTERNATE_SPACES)
        .map(|(area, _)| area.id.as_str())
        .collect();

    let message = compose_message(
        PushNotificationType::NudgeSpaceEngagement,
        json!({
            "spaceId": nearest.id,
            "category": nearest.category,
            "alternateSpaceIds": alternate_ids,
        }),
        &PushMessageConfig {
            device_token: ctx.device_token.clone(),
            user_id: ctx.user_id.clone(),
            locale: ctx.locale.clone(),
            total_areas_activated: None,
        },
    );
    if let Some(message) = message {
        if let Err(err) = state.push.send(message).await {
            tracing::error!(user_id = %ctx.user_id, error = %err, "互动提醒推送发送失败");
            return;
        }
    }

    {
        let upstream = state.upstream.clone();
        let ctx = ctx.clone();
        let location_id = tracked.id.clone();
        spawn_logged("mark_check_in_push_sent", async move {
            upstream
                .mark_check_in_push_sent(&ctx, &location_id, now_ms)
                .await
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> GeoPoint {
        GeoPoint {
            latitude: 37.0,
            longitude: -122.0,
        }
    }

    fn space_at(id: &str, meters_north: f64) -> Area {
        Area {
            id: id.into(),
            from_user_id: "owner".into(),
            latitude: 37.0 + meters_north / 111_195.0,
            longitude: -122.0,
            radius: 50.0,
            max_proximity: 10.0,
            does_require_proximity_view: false,
            is_public: true,
            category: Some("cafe".into()),
            notification_msg: None,
            max_views: None,
        }
    }

    fn record(id: &str, meters_north: f64, visit_count: i64, is_home: bool) -> UserLocationRecord {
        UserLocationRecord {
            id: id.into(),
            latitude: 37.0 + meters_north / 111_195.0,
            longitude: -122.0,
            visit_count,
            is_declared_home: is_home,
            last_push_notification_sent_ms: None,
        }
    }

    #[test]
    fn shortlist_includes_first_space_beyond_boundary() {
        let spaces = vec![
            space_at("far", 300.0),
            space_at("near", 100.0),
            space_at("mid", 150.0),
            space_at("beyond", 250.0),
        ];

        let shortlist = shortlist_possible_visits(spaces, &user());
        let ids: Vec<&str> = shortlist.iter().map(|(a, _)| a.id.as_str()).collect();

        // 250米是第一个越过200米边界的，包含之后停止
        assert_eq!(ids, vec!["near", "mid", "beyond"]);
    }

    #[test]
    fn shortlist_is_ordered_by_distance() {
        let spaces = vec![space_at("b", 120.0), space_at("a", 40.0)];
        let shortlist = shortlist_possible_visits(spaces, &user());

        assert_eq!(shortlist[0].0.id, "a");
        assert!(shortlist[0].1 < shortlist[1].1);
    }

    #[test]
    fn tracked_location_prefers_visit_count_within_range() {
        let records = vec![
            record("low", 50.0, 3, false),
            record("high", 100.0, 80, false),
            record("too-far", 10_000.0, 500, false),
        ];

        let tracked = pick_tracked_location(records, &user()).expect("should pick one");
        assert_eq!(tracked.id, "high");
    }

    #[test]
    fn declared_home_is_never_tracked() {
        let records = vec![
            record("home", 10.0, 900, true),
            record("cafe", 20.0, 5, false),
        ];

        let tracked = pick_tracked_location(records, &user()).expect("should pick one");
        assert_eq!(tracked.id, "cafe");
    }

    #[test]
    fn no_nearby_record_means_no_anchor() {
        let records = vec![record("remote", 5_000.0, 40, false)];
        assert!(pick_tracked_location(records, &user()).is_none());
    }
}
