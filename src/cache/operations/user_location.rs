use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redis::{AsyncCommands, Client as RedisClient, aio::MultiplexedConnection};

use crate::cache::keys::location_keys::{
    LAST_NOTIFICATION_DATE_FIELD, ORIGIN_FIELD, areas_geo_key, areas_key,
    max_activation_distance_key, unactivated_area_key,
};
use crate::cache::models::CachedArea;
use crate::error::AppError;
use crate::location::constants::{MAX_CACHED_AREA_QUERY_COUNT, USER_CACHE_TTL_SEC};
use crate::models::{Area, AreaKind, GeoPoint};

/// 每用户的地理缓存存储
///
/// 键空间按 (userId, kind) 划分。GEO索引里的区域都是"尚未确认激活"的候选，
/// 激活成功后必须立即移除，避免重复供给。
///
/// 写操作对调用方是 fire-and-forget：错误只记录日志，不阻塞请求；
/// 读操作需要调用方等待结果再决定走哪条分支。
#[async_trait]
pub trait GeoCacheStore: Send + Sync {
    async fn get_origin(&self, user_id: &str) -> Option<GeoPoint>;
    async fn set_origin(&self, user_id: &str, origin: &GeoPoint);

    async fn get_last_notification_date(&self, kind: AreaKind, user_id: &str) -> Option<i64>;
    /// 写入当前时间
    async fn set_last_notification_date(&self, kind: AreaKind, user_id: &str);

    async fn get_max_activation_distance(&self, kind: AreaKind, user_id: &str) -> Option<f64>;
    /// 单调性由调用方保证：必须传 max(当前值, 候选值)
    async fn set_max_activation_distance(&self, kind: AreaKind, user_id: &str, meters: f64);

    /// 写入/刷新GEO索引与快照，并把整个命名空间的TTL重置为20分钟
    async fn add_areas(&self, kind: AreaKind, user_id: &str, areas: &[Area]);
    /// 激活成功后立即调用，保证已激活区域不会被再次供给
    async fn remove_areas(&self, kind: AreaKind, user_id: &str, area_ids: &[String]);

    /// 半径查询，最多返回固定条数，默认按最近优先
    /// 返回的区域在写入时已过滤，缓存命中路径不再重查 reaction/距离
    async fn query_within_distance(
        &self,
        kind: AreaKind,
        user_id: &str,
        point: &GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Area>, AppError>;

    /// 立即丢弃该用户两种类型的全部缓存状态
    async fn invalidate(&self, user_id: &str);
}

/// 基于redis的实现
pub struct RedisGeoCacheStore {
    redis_client: Arc<RedisClient>,
}

impl RedisGeoCacheStore {
    pub fn new(redis_client: Arc<RedisClient>) -> Self {
        Self { redis_client }
    }

    async fn conn(&self) -> redis::RedisResult<MultiplexedConnection> {
        self.redis_client.get_multiplexed_async_connection().await
    }

    /// 删除某用户两种类型的全部键
    async fn drop_user_keys(&self, user_id: &str) -> redis::RedisResult<()> {
        let mut conn = self.conn().await?;
        let mut pipeline = redis::pipe();
        for kind in AreaKind::ALL {
            pipeline.del(areas_key(kind, user_id)).ignore();
            pipeline.del(areas_geo_key(kind, user_id)).ignore();
            pipeline.del(max_activation_distance_key(kind, user_id)).ignore();
        }
        // 单个快照键不逐一枚举，靠自身TTL过期；GEO索引删掉后它们已不可达
        pipeline.query_async::<()>(&mut conn).await
    }
}

#[async_trait]
impl GeoCacheStore for RedisGeoCacheStore {
    // origin 存在 moments 哈希上，两种类型的键总是一起失效
    async fn get_origin(&self, user_id: &str) -> Option<GeoPoint> {
        let mut conn = match self.conn().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(user_id, error = %err, "Redis connection error");
                return None;
            }
        };

        let raw: redis::RedisResult<Option<String>> = conn
            .hget(areas_key(AreaKind::Moment, user_id), ORIGIN_FIELD)
            .await;
        match raw {
            Ok(Some(json)) => serde_json::from_str(&json).ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::error!(user_id, error = %err, "读取缓存origin失败");
                None
            }
        }
    }

    async fn set_origin(&self, user_id: &str, origin: &GeoPoint) {
        let json = match serde_json::to_string(origin) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(user_id, error = %err, "origin序列化失败");
                return;
            }
        };

        let result = async {
            let mut conn = self.conn().await?;
            let mut pipeline = redis::pipe();
            pipeline
                .hset(areas_key(AreaKind::Moment, user_id), ORIGIN_FIELD, json)
                .ignore();
            for kind in AreaKind::ALL {
                pipeline
                    .expire(areas_key(kind, user_id), USER_CACHE_TTL_SEC as i64)
                    .ignore();
            }
            pipeline.query_async::<()>(&mut conn).await
        }
        .await;

        if let Err(err) = result {
            tracing::error!(user_id, error = %err, "写入缓存origin失败");
        }
    }

    async fn get_last_notification_date(&self, kind: AreaKind, user_id: &str) -> Option<i64> {
        let mut conn = match self.conn().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(user_id, error = %err, "Redis connection error");
                return None;
            }
        };

        let raw: redis::RedisResult<Option<String>> = conn
            .hget(areas_key(kind, user_id), LAST_NOTIFICATION_DATE_FIELD)
            .await;
        match raw {
            Ok(value) => value.and_then(|v| v.parse().ok()),
            Err(err) => {
                // 高错误率会导致推送过量
                tracing::error!(
                    user_id,
                    kind = kind.plural(),
                    error = %err,
                    "读取最近通知时间失败"
                );
                None
            }
        }
    }

    async fn set_last_notification_date(&self, kind: AreaKind, user_id: &str) {
        let now_ms = Utc::now().timestamp_millis();
        let result = async {
            let mut conn = self.conn().await?;
            let mut pipeline = redis::pipe();
            pipeline
                .hset(
                    areas_key(kind, user_id),
                    LAST_NOTIFICATION_DATE_FIELD,
                    now_ms,
                )
                .ignore()
                .expire(areas_key(kind, user_id), USER_CACHE_TTL_SEC as i64)
                .ignore();
            pipeline.query_async::<()>(&mut conn).await
        }
        .await;

        if let Err(err) = result {
            tracing::error!(user_id, kind = kind.plural(), error = %err, "写入最近通知时间失败");
        }
    }

    async fn get_max_activation_distance(&self, kind: AreaKind, user_id: &str) -> Option<f64> {
        let mut conn = match self.conn().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(user_id, error = %err, "Redis connection error");
                return None;
            }
        };

        let raw: redis::RedisResult<Option<String>> =
            conn.get(max_activation_distance_key(kind, user_id)).await;
        match raw {
            Ok(value) => value.and_then(|v| v.parse().ok()),
            Err(err) => {
                tracing::error!(user_id, kind = kind.plural(), error = %err, "读取最大激活距离失败");
                None
            }
        }
    }

    async fn set_max_activation_distance(&self, kind: AreaKind, user_id: &str, meters: f64) {
        let result = async {
            let mut conn = self.conn().await?;
            let mut pipeline = redis::pipe();
            pipeline
                .set(max_activation_distance_key(kind, user_id), meters)
                .ignore()
                .expire(
                    max_activation_distance_key(kind, user_id),
                    USER_CACHE_TTL_SEC as i64,
                )
                .ignore();
            pipeline.query_async::<()>(&mut conn).await
        }
        .await;

        if let Err(err) = result {
            tracing::error!(user_id, kind = kind.plural(), error = %err, "写入最大激活距离失败");
        }
    }

    async fn add_areas(&self, kind: AreaKind, user_id: &str, areas: &[Area]) {
        if areas.is_empty() {
            return;
        }

        let result = async {
            let mut conn = self.conn().await?;
            let geo_key = areas_geo_key(kind, user_id);
            let mut pipeline = redis::pipe();
            for area in areas {
                let snapshot_key = unactivated_area_key(kind, user_id, &area.id);
                let fields = CachedArea::from(area).to_hash_fields();
                pipeline
                    .cmd("GEOADD")
                    .arg(&geo_key)
                    .arg(area.longitude)
                    .arg(area.latitude)
                    .arg(&area.id)
                    .ignore();
                pipeline.del(&snapshot_key).ignore();
                pipeline.hset_multiple(&snapshot_key, &fields).ignore();
                pipeline
                    .expire(&snapshot_key, USER_CACHE_TTL_SEC as i64)
                    .ignore();
            }
            pipeline.expire(&geo_key, USER_CACHE_TTL_SEC as i64).ignore();
            pipeline
                .expire(areas_key(kind, user_id), USER_CACHE_TTL_SEC as i64)
                .ignore();
            pipeline.query_async::<()>(&mut conn).await
        }
        .await;

        if let Err(err) = result {
            // 缓存失败会导致反复全量拉取；索引写坏则更糟，整体失效换一次干净重建
            tracing::error!(
                user_id,
                kind = kind.plural(),
                count = areas.len(),
                error = %err,
                "缓存附近区域失败，丢弃该用户缓存"
            );
            self.invalidate(user_id).await;
        } else {
            tracing::debug!(
                user_id,
                kind = kind.plural(),
                count = areas.len(),
                "cached nearby areas"
            );
        }
    }

    async fn remove_areas(&self, kind: AreaKind, user_id: &str, area_ids: &[String]) {
        if area_ids.is_empty() {
            return;
        }

        let result = async {
            let mut conn = self.conn().await?;
            let geo_key = areas_geo_key(kind, user_id);
            let mut pipeline = redis::pipe();
            for id in area_ids {
                pipeline.zrem(&geo_key, id).ignore();
                pipeline.del(unactivated_area_key(kind, user_id, id)).ignore();
            }
            pipeline.query_async::<()>(&mut conn).await
        }
        .await;

        if let Err(err) = result {
            // 移除失败意味着已激活区域可能再次出现在候选里
            tracing::error!(
                user_id,
                kind = kind.plural(),
                area_ids = ?area_ids,
                error = %err,
                "从未激活缓存移除区域失败"
            );
        }
    }

    async fn query_within_distance(
        &self,
        kind: AreaKind,
        user_id: &str,
        point: &GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Area>, AppError> {
        let result: redis::RedisResult<Vec<Area>> = async {
            let mut conn = self.conn().await?;
            let geo_key = areas_geo_key(kind, user_id);

            let area_ids: Vec<String> = redis::cmd("GEORADIUS")
                .arg(&geo_key)
                .arg(point.longitude)
                .arg(point.latitude)
                .arg(radius_meters)
                .arg("m")
                .arg("ASC")
                .arg("COUNT")
                .arg(MAX_CACHED_AREA_QUERY_COUNT)
                .query_async(&mut conn)
                .await?;

            if area_ids.is_empty() {
                return Ok(Vec::new());
            }

            let mut pipeline = redis::pipe();
            for id in &area_ids {
                pipeline.hgetall(unactivated_area_key(kind, user_id, id));
            }
            let snapshots: Vec<HashMap<String, String>> =
                pipeline.query_async(&mut conn).await?;

            let areas = snapshots
                .iter()
                .filter_map(CachedArea::from_hash_fields)
                .map(Area::from)
                .collect();
            Ok(areas)
        }
        .await;

        match result {
            Ok(areas) => Ok(areas),
            Err(err) => {
                tracing::error!(
                    user_id,
                    kind = kind.plural(),
                    error = %err,
                    "缓存地理查询失败，丢弃该用户缓存"
                );
                self.invalidate(user_id).await;
                Err(AppError::CacheUnavailable)
            }
        }
    }

    async fn invalidate(&self, user_id: &str) {
        if let Err(err) = self.drop_user_keys(user_id).await {
            tracing::error!(user_id, error = %err, "缓存失效操作失败");
        }
    }
}
