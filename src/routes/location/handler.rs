use axum::{Extension, Json, extract::State};

use crate::AppState;
use crate::error::AppError;
use crate::location::activate::{activate_areas_and_notify, select_areas_to_activate};
use crate::location::constants::AREA_PROXIMITY_NEARBY_METERS;
use crate::location::refresh::get_all_nearby_areas;
use crate::location::visits::process_possible_visit;
use crate::middleware::RequestContext;
use crate::models::GeoPoint;
use crate::utils::{ApiResponse, success_to_api_response};

use super::model::{BackgroundLocationRequest, ProcessLocationRequest, ProcessLocationResponse};

/// 前台位置更新
/// 响应只等到激活选择完成；激活提交和通知在后台收尾
pub async fn process_location_update(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<ProcessLocationRequest>,
) -> Result<Json<ApiResponse<ProcessLocationResponse>>, AppError> {
    let location = GeoPoint {
        latitude: request.latitude,
        longitude: request.longitude,
    };
    tracing::info!(
        user_id = %ctx.user_id,
        latitude = location.latitude,
        longitude = location.longitude,
        "processing foreground location update"
    );

    let nearby =
        get_all_nearby_areas(&state, &ctx, &location, AREA_PROXIMITY_NEARBY_METERS).await?;

    let selection = select_areas_to_activate(
        nearby.moments.newly_discovered,
        nearby.spaces.newly_discovered,
    );
    let activated_areas = selection.response_areas();

    tokio::spawn(activate_areas_and_notify(
        state,
        ctx,
        selection,
        location,
    ));

    Ok(success_to_api_response(ProcessLocationResponse {
        activated_areas,
    }))
}

/// 后台定位SDK上报
/// SDK对非2xx会指数退避并停止上报，所以这里无论内部成败都返回成功信封
pub async fn process_background_location(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<BackgroundLocationRequest>,
) -> Json<ApiResponse<ProcessLocationResponse>> {
    let response = success_to_api_response(ProcessLocationResponse {
        activated_areas: Vec::new(),
    });

    // 移动中的上报只是路过，不值得一次缓存重建
    if request.is_moving() {
        return response;
    }
    let Some(location) = request.point() else {
        tracing::warn!(user_id = %ctx.user_id, "后台上报缺少坐标，忽略");
        return response;
    };

    tracing::info!(
        user_id = %ctx.user_id,
        latitude = location.latitude,
        longitude = location.longitude,
        platform = request.platform_os.as_deref().unwrap_or("unknown"),
        "processing background location update"
    );

    // 静止上报用更紧的失效阈值，站定了才值得精确重建
    tokio::spawn(async move {
        let nearby = match get_all_nearby_areas(
            &state,
            &ctx,
            &location,
            AREA_PROXIMITY_NEARBY_METERS / 4.0,
        )
        .await
        {
            Ok(nearby) => nearby,
            Err(err) => {
                tracing::error!(user_id = %ctx.user_id, error = ?err, "后台区域查询失败");
                return;
            }
        };

        let candidate_spaces = nearby.spaces.newly_discovered.clone();
        let selection = select_areas_to_activate(
            nearby.moments.newly_discovered,
            nearby.spaces.newly_discovered,
        );

        tokio::join!(
            activate_areas_and_notify(state.clone(), ctx.clone(), selection, location),
            process_possible_visit(&state, &ctx, &location, candidate_spaces),
        );
    });

    response
}
