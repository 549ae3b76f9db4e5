//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno. Todas las variables
//! tienen un valor por defecto razonable para desarrollo; un valor presente
//! pero inválido es un error de arranque.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

use crate::repositories::DEFAULT_FEED_CAPACITY;

/// 16 MiB: una foto de cámara de varios MB codificada en base64
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Backend de persistencia de rutas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(anyhow!("Unknown STORE_BACKEND '{}', expected 'memory' or 'postgres'", other)),
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub log_level: tracing::Level,
    pub cors_origins: Vec<String>,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub route_cache_ttl: u64,
    pub photo_storage_dir: PathBuf,
    pub photo_public_base_url: String,
    pub photo_upload_url: Option<String>,
    /// Segundos antes de abandonar una subida de foto
    pub photo_upload_timeout: u64,
    /// Tamaño máximo del body JSON, las fotos viajan en base64 dentro
    pub max_body_bytes: usize,
    pub feed_capacity: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            log_level: tracing::Level::INFO,
            cors_origins: Vec::new(),
            store_backend: StoreBackend::Memory,
            database_url: None,
            database_max_connections: 10,
            redis_url: None,
            route_cache_ttl: 300,
            photo_storage_dir: PathBuf::from("./data/photos"),
            photo_public_base_url: "http://localhost:3000/photos".to_string(),
            photo_upload_url: None,
            photo_upload_timeout: 30,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl EnvironmentConfig {
    /// Cargar la configuración desde las variables de entorno
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Cargar la configuración desde una función de búsqueda arbitraria
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = var("DATABASE_URL");
        let store_backend = match var("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None if database_url.is_some() => StoreBackend::Postgres,
            None => StoreBackend::Memory,
        };
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("STORE_BACKEND=postgres requires DATABASE_URL");
        }

        Ok(Self {
            environment: var("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parse_or(var("PORT"), "PORT", defaults.port)?,
            host: var("HOST").unwrap_or(defaults.host),
            log_level: parse_or(var("LOG_LEVEL"), "LOG_LEVEL", defaults.log_level)?,
            cors_origins: var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            store_backend,
            database_url,
            database_max_connections: parse_or(
                var("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            redis_url: var("REDIS_URL"),
            route_cache_ttl: parse_or(var("ROUTE_CACHE_TTL"), "ROUTE_CACHE_TTL", defaults.route_cache_ttl)?,
            photo_storage_dir: var("PHOTO_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.photo_storage_dir),
            photo_public_base_url: var("PHOTO_PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.photo_public_base_url),
            photo_upload_url: var("PHOTO_UPLOAD_URL"),
            photo_upload_timeout: parse_or(
                var("PHOTO_UPLOAD_TIMEOUT"),
                "PHOTO_UPLOAD_TIMEOUT",
                defaults.photo_upload_timeout,
            )?
            .max(1),
            max_body_bytes: parse_or(var("MAX_BODY_BYTES"), "MAX_BODY_BYTES", defaults.max_body_bytes)?,
            feed_capacity: parse_or(var("FEED_CAPACITY"), "FEED_CAPACITY", defaults.feed_capacity)?,
        })
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("{} must be valid, got '{}'", key, raw)),
        None => Ok(default),
    }
}
