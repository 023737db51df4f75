// 位置处理管线
// 缓存刷新 -> 邻近过滤 -> 激活编排，外加后台访店启发式

pub mod activate;
pub mod constants;
pub mod filter;
pub mod refresh;
pub mod visits;

use crate::models::GeoPoint;
use constants::{
    MIN_TIME_BETWEEN_CHECK_IN_PUSH_NOTIFICATIONS_MS, MIN_TIME_BETWEEN_PUSH_NOTIFICATIONS_MS,
};

/// 推送节流窗口的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationWindow {
    Generic,
    CheckIn,
}

impl NotificationWindow {
    fn min_interval_ms(&self) -> i64 {
        match self {
            NotificationWindow::Generic => MIN_TIME_BETWEEN_PUSH_NOTIFICATIONS_MS,
            NotificationWindow::CheckIn => MIN_TIME_BETWEEN_CHECK_IN_PUSH_NOTIFICATIONS_MS,
        }
    }
}

/// 最近是否已发送过同类通知
pub fn has_sent_notification_recently(
    last_notification_ms: Option<i64>,
    now_ms: i64,
    window: NotificationWindow,
) -> bool {
    match last_notification_ms {
        Some(last) => now_ms - last < window.min_interval_ms(),
        None => false,
    }
}

/// 球面距离（米），Haversine公式
/// 参数顺序统一为(经度, 纬度)，调用方不得交换
pub fn distance_meters(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let r = 6371000.0; // 地球半径（米）
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    r * c
}

/// 两个坐标点之间的距离（米）
pub fn distance_between(a: &GeoPoint, b: &GeoPoint) -> f64 {
    distance_meters(a.longitude, a.latitude, b.longitude, b.latitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_for_same_point() {
        let d = distance_meters(-122.4194, 37.7749, -122.4194, 37.7749);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn distance_approximates_one_degree_of_latitude() {
        // 纬度1度约111公里
        let d = distance_meters(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111_195.0).abs() < 200.0, "got {}", d);
    }

    #[test]
    fn notification_recency_uses_generic_window() {
        let now = 10_000_000_000;
        let recent = now - MIN_TIME_BETWEEN_PUSH_NOTIFICATIONS_MS / 2;
        let old = now - MIN_TIME_BETWEEN_PUSH_NOTIFICATIONS_MS - 1000;

        assert!(has_sent_notification_recently(
            Some(recent),
            now,
            NotificationWindow::Generic
        ));
        assert!(!has_sent_notification_recently(
            Some(old),
            now,
            NotificationWindow::Generic
        ));
        assert!(!has_sent_notification_recently(
            None,
            now,
            NotificationWindow::Generic
        ));
    }

    #[test]
    fn check_in_window_is_wider_than_generic() {
        let now = 10_000_000_000;
        // 超出普通窗口但仍在签到窗口内
        let between = now - MIN_TIME_BETWEEN_PUSH_NOTIFICATIONS_MS - 1000;

        assert!(!has_sent_notification_recently(
            Some(between),
            now,
            NotificationWindow::Generic
        ));
        assert!(has_sent_notification_recently(
            Some(between),
            now,
            NotificationWindow::CheckIn
        ));
    }
}
