use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use delivery_tracker::cache::{CacheConfig, RedisClient, RouteListCache};
use delivery_tracker::config::{DatabaseConfig, EnvironmentConfig, StoreBackend};
use delivery_tracker::database::DatabaseConnection;
use delivery_tracker::repositories::{InMemoryRouteStore, PgRouteStore, RouteFeed, RouteStore};
use delivery_tracker::routes::create_app_router;
use delivery_tracker::services::{HttpPhotoStorage, LocalPhotoStorage, PhotoStorage, RouteService};
use delivery_tracker::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    info!("🚚 Delivery Tracker - API de rutas de entrega");
    info!("==============================================");

    // Inicializar el store de rutas
    let feed = RouteFeed::new(config.feed_capacity);
    let (store, listener): (Arc<dyn RouteStore>, Option<JoinHandle<()>>) = match config.store_backend {
        StoreBackend::Memory => {
            warn!("💾 Usando store en memoria: los datos se pierden al reiniciar");
            (Arc::new(InMemoryRouteStore::with_feed(feed)), None)
        }
        StoreBackend::Postgres => {
            let db_config = DatabaseConfig::from_environment(&config)
                .context("DATABASE_URL must be set for the postgres backend")?;
            let connection = DatabaseConnection::connect(&db_config).await?;
            connection.run_migrations().await?;

            let store = PgRouteStore::new(connection.pool().clone(), feed);
            let listener = store.start_listener().await?;
            (Arc::new(store), Some(listener))
        }
    };

    // Almacenamiento de fotos
    let (photos, photo_dir): (Arc<dyn PhotoStorage>, Option<PathBuf>) = match &config.photo_upload_url {
        Some(upload_url) => {
            info!("📸 Fotos subidas a {}", upload_url);
            let storage = HttpPhotoStorage::new(
                upload_url.clone(),
                config.photo_public_base_url.clone(),
                Duration::from_secs(config.photo_upload_timeout),
            )?;
            (Arc::new(storage), None)
        }
        None => {
            info!("📸 Fotos guardadas en {}", config.photo_storage_dir.display());
            let storage = LocalPhotoStorage::new(
                config.photo_storage_dir.clone(),
                config.photo_public_base_url.clone(),
            );
            (Arc::new(storage), Some(config.photo_storage_dir.clone()))
        }
    };

    let mut routes = RouteService::new(store, photos);

    // Inicializar Redis y cache, opcional
    if let Some(cache_config) = CacheConfig::from_environment(&config) {
        match RedisClient::new(cache_config).await {
            Ok(client) => routes = routes.with_cache(RouteListCache::new(client)),
            Err(e) => warn!("⚠️ Redis no disponible, se continúa sin cache: {}", e),
        }
    }

    let addr: SocketAddr = config
        .server_url()
        .parse()
        .with_context(|| format!("Invalid HOST/PORT: {}", config.server_url()))?;

    let app = create_app_router(AppState::new(routes, config), photo_dir);

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET    /health - Estado del servicio");
    info!("   POST   /api/routes - Crear ruta");
    info!("   GET    /api/routes - Listar rutas");
    info!("   GET    /api/routes/stream - Rutas en vivo (SSE)");
    info!("   GET    /api/routes/:id - Obtener ruta");
    info!("   PATCH  /api/routes/:id - Actualizar ruta");
    info!("   DELETE /api/routes/:id - Eliminar ruta");
    info!("   POST   /api/routes/:id/deliveries - Registrar entrega");

    let tcp_listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(tcp_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(listener) = listener {
        listener.abort();
    }

    if let Err(e) = served {
        error!("❌ Servidor terminó con error: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
