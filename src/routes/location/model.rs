use serde::{Deserialize, Serialize};

use crate::models::{Area, GeoPoint};

/// 前台位置更新请求
#[derive(Debug, Deserialize)]
pub struct ProcessLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// 后台定位SDK上报的坐标
#[derive(Debug, Default, Deserialize)]
pub struct BackgroundCoords {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// 后台定位SDK上报的位置体
#[derive(Debug, Default, Deserialize)]
pub struct BackgroundLocation {
    #[serde(default)]
    pub coords: BackgroundCoords,
    #[serde(default)]
    pub is_moving: Option<bool>,
}

/// 后台位置更新请求（字段随SDK版本漂移，全部宽松可选）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundLocationRequest {
    #[serde(default)]
    pub location: Option<BackgroundLocation>,
    #[serde(default, rename = "platformOS")]
    pub platform_os: Option<String>,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(default)]
    pub is_device_tablet: Option<bool>,
}

impl BackgroundLocationRequest {
    /// 取出有效坐标；缺经纬度按无效处理
    pub fn point(&self) -> Option<GeoPoint> {
        let location = self.location.as_ref()?;
        Some(GeoPoint {
            latitude: location.coords.latitude?,
            longitude: location.coords.longitude?,
        })
    }

    pub fn is_moving(&self) -> bool {
        self.location
            .as_ref()
            .and_then(|location| location.is_moving)
            .unwrap_or(false)
    }
}

/// 前台位置更新响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessLocationResponse {
    pub activated_areas: Vec<Area>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_request_without_coords_has_no_point() {
        let request: BackgroundLocationRequest =
            serde_json::from_str(r#"{"platformOS": "ios"}"#).unwrap();
        assert!(request.point().is_none());
        assert!(!request.is_moving());
    }

    #[test]
    fn background_request_parses_sdk_shape() {
        let request: BackgroundLocationRequest = serde_json::from_str(
            r#"{
                "location": {
                    "coords": {"latitude": 37.7749, "longitude": -122.4194},
                    "is_moving": false
                },
                "platformOS": "android",
                "deviceModel": "Pixel 6"
            }"#,
        )
        .unwrap();

        let point = request.point().expect("coords present");
        assert_eq!(point.latitude, 37.7749);
        assert!(!request.is_moving());
        assert_eq!(request.platform_os.as_deref(), Some("android"));
    }

    #[test]
    fn partial_coords_are_invalid() {
        let request: BackgroundLocationRequest = serde_json::from_str(
            r#"{"location": {"coords": {"latitude": 37.0}, "is_moving": false}}"#,
        )
        .unwrap();
        assert!(request.point().is_none());
    }
}
