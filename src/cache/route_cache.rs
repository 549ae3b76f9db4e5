//! Cache de snapshots de la lista de rutas
//!
//! Cada snapshot se guarda bajo la generación vigente al momento de leer el
//! store. Toda mutación incrementa la generación después de confirmarse, así
//! que un snapshot leído antes de una mutación nunca se sirve después de ella.
//! Cualquier error de Redis hace que el llamador lea directamente del store.

use tracing::warn;

use super::{CacheOperations, RedisClient};
use crate::models::Route;

const ROUTES_PREFIX: &str = "routes";

#[derive(Clone)]
pub struct RouteListCache {
    redis: RedisClient,
    ttl: u64,
}

impl RouteListCache {
    pub fn new(redis: RedisClient) -> Self {
        let ttl = redis.config().default_ttl;
        Self { redis, ttl }
    }

    pub fn generation_key(&self) -> String {
        self.redis.make_key(ROUTES_PREFIX, "generation")
    }

    pub fn snapshot_key(&self, generation: i64) -> String {
        self.redis.make_key(ROUTES_PREFIX, &format!("list:{}", generation))
    }

    /// Generación actual, `None` si Redis no responde
    pub async fn generation(&self) -> Option<i64> {
        match self.redis.get::<i64>(&self.generation_key()).await {
            Ok(generation) => Some(generation.unwrap_or(0)),
            Err(e) => {
                warn!("⚠️ Cache de rutas no disponible: {}", e);
                None
            }
        }
    }

    pub async fn get_snapshot(&self, generation: i64) -> Option<Vec<Route>> {
        match self.redis.get::<Vec<Route>>(&self.snapshot_key(generation)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("⚠️ Error leyendo snapshot de rutas: {}", e);
                None
            }
        }
    }

    pub async fn store_snapshot(&self, generation: i64, routes: &[Route]) {
        if let Err(e) = self.redis.set(&self.snapshot_key(generation), &routes, self.ttl).await {
            warn!("⚠️ Error guardando snapshot de rutas: {}", e);
        }
    }

    /// Invalidar todos los snapshots existentes
    pub async fn invalidate(&self) {
        if let Err(e) = self.redis.incr(&self.generation_key()).await {
            warn!("⚠️ No se pudo invalidar el cache de rutas, expirará en {}s: {}", self.ttl, e);
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.redis.is_connected().await
    }
}
