// 位置处理相关常量
// 距离单位统一为米，时间间隔统一为毫秒

/// 用户缓存过期时间（秒），20分钟
pub const USER_CACHE_TTL_SEC: u64 = 60 * 20;

/// 激活距离的基准值（米）
pub const AREA_PROXIMITY_METERS: f64 = 50.0;

/// 前台定位的缓存失效阈值（米），后台定位用其四分之一
pub const AREA_PROXIMITY_NEARBY_METERS: f64 = 150.0;

/// 全量拉取 moments 的搜索半径（米），spaces 用一半
pub const AREA_PROXIMITY_EXPANDED_METERS: f64 = 2000.0;

/// 缓存未记录最大激活距离时的查询半径回退值（米）
pub const FALLBACK_CACHE_SEARCH_RADIUS_METERS: f64 = 1000.0;

/// 单次位置更新最多激活的区域数，抑制高密度地段
pub const MAX_AREA_ACTIVATE_COUNT: usize = 5;

/// 缓存地理查询返回的最大条数
pub const MAX_CACHED_AREA_QUERY_COUNT: usize = 100;

/// 普通推送的最小间隔（毫秒），20分钟
pub const MIN_TIME_BETWEEN_PUSH_NOTIFICATIONS_MS: i64 = 1000 * 60 * 20;

/// 签到类推送的最小间隔（毫秒），12小时
pub const MIN_TIME_BETWEEN_CHECK_IN_PUSH_NOTIFICATIONS_MS: i64 = 1000 * 60 * 60 * 12;

/// 后台访店判定的最大距离（米）
pub const MAX_DISTANCE_TO_CHECK_IN_METERS: f64 = 200.0;

/// 聚合推送最多携带的区域条目数，避免超出推送负载上限
pub const MAX_AREAS_IN_PUSH_PAYLOAD: usize = 20;

/// 上游搜索的单页条数
pub const AREA_SEARCH_ITEMS_PER_PAGE: usize = 100;
