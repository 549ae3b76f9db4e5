//! Configuración de cache
//!
//! Este módulo contiene la configuración para el sistema de cache.

use serde::{Deserialize, Serialize};

use crate::config::EnvironmentConfig;

/// Configuración del cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
    pub default_ttl: u64,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            default_ttl: 300, // 5 minutos
            key_prefix: "delivery_tracker".to_string(),
        }
    }
}

impl CacheConfig {
    /// Construir desde la configuración del entorno, si hay REDIS_URL
    pub fn from_environment(config: &EnvironmentConfig) -> Option<Self> {
        config.redis_url.as_ref().map(|url| Self {
            redis_url: url.clone(),
            default_ttl: config.route_cache_ttl.max(1),
            ..Self::default()
        })
    }
}
