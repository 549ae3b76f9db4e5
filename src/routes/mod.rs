//! Rutas HTTP
//!
//! Este módulo arma el router principal de la API.

pub mod route_routes;

use std::path::PathBuf;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::middleware::{cors_middleware, cors_middleware_with_origins};
use crate::state::AppState;

/// Crear el router completo de la aplicación.
///
/// `photo_dir` se sirve bajo `/photos` cuando las fotos se guardan en disco.
pub fn create_app_router(state: AppState, photo_dir: Option<PathBuf>) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        cors_middleware()
    } else {
        cors_middleware_with_origins(state.config.cors_origins.clone())
    };

    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest("/api/routes", route_routes::create_route_router());

    if let Some(dir) = photo_dir {
        router = router.nest_service("/photos", ServeDir::new(dir));
    }

    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);

    router
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check: backend de persistencia y estado del cache
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cache = match state.routes.cache() {
        Some(cache) => {
            if cache.is_connected().await {
                "connected"
            } else {
                "unavailable"
            }
        }
        None => "disabled",
    };

    Json(json!({
        "status": "ok",
        "service": "delivery-tracker",
        "backend": state.routes.backend_name(),
        "cache": cache,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
