pub mod auth;
pub mod error_handler;

pub use auth::{RequestContext, context_middleware};
pub use error_handler::log_errors;
