//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::services::RouteService;

#[derive(Clone)]
pub struct AppState {
    pub routes: RouteService,
    pub config: Arc<EnvironmentConfig>,
}

impl AppState {
    pub fn new(routes: RouteService, config: EnvironmentConfig) -> Self {
        Self {
            routes,
            config: Arc::new(config),
        }
    }
}
