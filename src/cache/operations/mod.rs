pub mod user_location;

pub use user_location::{GeoCacheStore, RedisGeoCacheStore};
