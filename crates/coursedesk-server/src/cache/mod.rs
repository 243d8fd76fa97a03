//! Read cache and key-value store backends.

pub mod accessor;
pub mod keys;
pub mod redis_store;

pub use accessor::CacheAside;
pub use keys::CacheKey;
pub use redis_store::RedisKeyValueStore;
