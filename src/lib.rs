use std::sync::Arc;

use crate::cache::GeoCacheStore;
use crate::config::Config;
use crate::gateways::UpstreamGateway;
use crate::push::PushSender;

pub mod cache;
pub mod config;
pub mod error;
pub mod gateways;
pub mod location;
pub mod middleware;
pub mod models;
pub mod push;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn GeoCacheStore>,
    pub upstream: Arc<dyn UpstreamGateway>,
    pub push: Arc<dyn PushSender>,
}
