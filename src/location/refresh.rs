use crate::AppState;
use crate::cache::GeoCacheStore;
use crate::error::AppError;
use crate::location::constants::FALLBACK_CACHE_SEARCH_RADIUS_METERS;
use crate::location::distance_between;
use crate::location::filter::filter_nearby_areas;
use crate::middleware::RequestContext;
use crate::models::{Area, AreaKind, GeoPoint};
use crate::utils::spawn_logged;

/// 单一类型的查询结果
#[derive(Debug, Default)]
pub struct KindAreas {
    /// 本轮看到的候选：全量拉取时是原始搜索结果，缓存命中时是缓存查询结果
    pub areas: Vec<Area>,
    /// 过滤后的幸存者；缓存命中路径与 areas 相同（写入时已过滤）
    pub newly_discovered: Vec<Area>,
}

/// 两种类型的查询结果
#[derive(Debug, Default)]
pub struct NearbyAreas {
    pub moments: KindAreas,
    pub spaces: KindAreas,
}

fn origin_is_stale(origin: &GeoPoint, location: &GeoPoint, threshold_meters: f64) -> bool {
    distance_between(origin, location) > threshold_meters
}

/// 缓存是否已失效：没有origin，或用户离origin超过阈值
pub async fn should_invalidate_cache(
    store: &dyn GeoCacheStore,
    user_id: &str,
    location: &GeoPoint,
    threshold_meters: f64,
) -> bool {
    match store.get_origin(user_id).await {
        Some(origin) => origin_is_stale(&origin, location, threshold_meters),
        None => true,
    }
}

/// 全量拉取某一类型：上游搜索 -> 邻近过滤
async fn fetch_nearby_areas(
    state: &AppState,
    ctx: &RequestContext,
    kind: AreaKind,
    location: &GeoPoint,
) -> Result<KindAreas, AppError> {
    let raw_areas = state
        .upstream
        .search_areas(ctx, kind, location, kind.search_radius_meters())
        .await
        .map_err(|err| {
            tracing::error!(
                user_id = %ctx.user_id,
                kind = kind.plural(),
                error = %err,
                "区域搜索失败"
            );
            AppError::UpstreamUnavailable
        })?;

    let newly_discovered =
        filter_nearby_areas(state, ctx, kind, raw_areas.clone(), location).await;

    Ok(KindAreas {
        areas: raw_areas,
        newly_discovered,
    })
}

/// 缓存命中路径：缓存里的区域写入时已经过滤，不再重查 reaction/距离
async fn get_cached_nearby_areas(
    state: &AppState,
    ctx: &RequestContext,
    kind: AreaKind,
    location: &GeoPoint,
) -> Result<KindAreas, AppError> {
    // 用缓存的最大激活距离收束查询半径，只查可能达标的候选
    let radius = state
        .store
        .get_max_activation_distance(kind, &ctx.user_id)
        .await
        .unwrap_or(FALLBACK_CACHE_SEARCH_RADIUS_METERS);

    let areas = state
        .store
        .query_within_distance(kind, &ctx.user_id, location, radius)
        .await?;

    Ok(KindAreas {
        newly_discovered: areas.clone(),
        areas,
    })
}

/// 每次位置更新的入口：判定缓存新鲜度，选择缓存查询或全量重建
pub async fn get_all_nearby_areas(
    state: &AppState,
    ctx: &RequestContext,
    location: &GeoPoint,
    invalidation_threshold_meters: f64,
) -> Result<NearbyAreas, AppError> {
    let should_invalidate = should_invalidate_cache(
        state.store.as_ref(),
        &ctx.user_id,
        location,
        invalidation_threshold_meters,
    )
    .await;

    if should_invalidate {
        state.store.invalidate(&ctx.user_id).await;

        // 顺手刷新用户的最近已知位置
        {
            let upstream = state.upstream.clone();
            let ctx = ctx.clone();
            let location = *location;
            spawn_logged("update_last_known_location", async move {
                upstream.update_last_known_location(&ctx, &location).await
            });
        }

        // 全量重建后origin重置到当前位置
        state.store.set_origin(&ctx.user_id, location).await;

        let (moments, spaces) = tokio::join!(
            fetch_nearby_areas(state, ctx, AreaKind::Moment, location),
            fetch_nearby_areas(state, ctx, AreaKind::Space, location),
        );

        return Ok(NearbyAreas {
            moments: moments?,
            spaces: spaces?,
        });
    }

    let (moments, spaces) = tokio::join!(
        get_cached_nearby_areas(state, ctx, AreaKind::Moment, location),
        get_cached_nearby_areas(state, ctx, AreaKind::Space, location),
    );

    Ok(NearbyAreas {
        moments: moments?,
        spaces: spaces?,
    })
}
