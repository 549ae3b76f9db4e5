//! Cache
//!
//! Este módulo contiene el cliente Redis y el cache de snapshots de rutas.

pub mod cache_config;
pub mod redis_client;
pub mod route_cache;

pub use cache_config::CacheConfig;
pub use redis_client::RedisClient;
pub use route_cache::RouteListCache;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Operaciones de cache
#[async_trait::async_trait]
pub trait CacheOperations {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: u64) -> Result<()>;
    async fn incr(&self, key: &str) -> Result<i64>;
}
