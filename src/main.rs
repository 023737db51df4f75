use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{Router, routing::post};
use proximity_backend::{
    AppState,
    cache::RedisGeoCacheStore,
    config::Config,
    gateways::http::HttpUpstreamGateway,
    middleware::{context_middleware, log_errors},
    push::FcmPushSender,
    routes,
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置 Redis 客户端
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client);

    // 上游服务和推送网关共用一个HTTP客户端
    let http_client = reqwest::Client::builder()
        .timeout(config.upstream_timeout())
        .build()
        .expect("Failed to build HTTP client");

    // 设置应用状态
    let state = AppState {
        config: config.clone(),
        store: Arc::new(RedisGeoCacheStore::new(redis_arc)),
        upstream: Arc::new(HttpUpstreamGateway::new(
            http_client.clone(),
            config.clone(),
        )),
        push: Arc::new(FcmPushSender::new(http_client, config.clone())),
    };

    // 位置路由全部需要请求上下文
    let protected_routes = Router::new()
        .route(
            "/users/location/process",
            post(routes::location::process_location_update),
        )
        .route(
            "/users/location/background",
            post(routes::location::process_background_location),
        )
        .layer(axum::middleware::from_fn(context_middleware));

    // 创建基础路由
    let router = Router::new().nest(&config.api_base_uri.clone(), protected_routes);

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
