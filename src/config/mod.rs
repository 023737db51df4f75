use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub maps_service_route: String,
    pub reactions_service_route: String,
    pub users_service_route: String,
    pub push_gateway_url: String,
    pub push_gateway_key: String,
    pub upstream_timeout_secs: u64,
    /// 激活边界的全局容差（米），用作灰度放量的调节杆
    pub location_expansion_meters: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api/v1".into()),
            maps_service_route: env::var("MAPS_SERVICE_ROUTE")?,
            reactions_service_route: env::var("REACTIONS_SERVICE_ROUTE")?,
            users_service_route: env::var("USERS_SERVICE_ROUTE")?,
            push_gateway_url: env::var("PUSH_GATEWAY_URL")?,
            push_gateway_key: env::var("PUSH_GATEWAY_KEY").unwrap_or_default(),
            upstream_timeout_secs: env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            location_expansion_meters: env::var("LOCATION_EXPANSION_METERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
