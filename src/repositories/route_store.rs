//! Interfaz del Route Store
//!
//! El trait abstrae el backend de persistencia (memoria, PostgreSQL). Cada
//! backend garantiza por sí mismo que el incremento de `deliveredCount` y el
//! append de la entrega se aplican juntos y respetando `packageCount`.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Delivery, NewRoute, Route, RouteChange, RoutePatch};
use crate::utils::errors::StoreResult;

/// Capacidad por defecto del canal de cambios
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Backend de persistencia de rutas
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Nombre corto del backend, para logs y health check
    fn backend_name(&self) -> &'static str;

    /// Persistir una ruta nueva con `deliveredCount = 0`
    async fn create(&self, new_route: NewRoute) -> StoreResult<Route>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Route>>;

    /// Todas las rutas, la más reciente primero
    async fn list(&self) -> StoreResult<Vec<Route>>;

    /// Aplicar un patch parcial. `NotFound` si la ruta no existe.
    async fn update(&self, id: Uuid, patch: RoutePatch) -> StoreResult<Route>;

    /// Borrar una ruta. Devuelve `false` si no existía.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Incrementar `deliveredCount` y añadir la entrega en una sola escritura.
    ///
    /// Falla con `OverDelivery` si la ruta ya está completa y con `NotFound`
    /// si no existe; en ambos casos no se modifica nada.
    async fn append_delivery(&self, id: Uuid, delivery: Delivery) -> StoreResult<Route>;

    /// Suscribirse a los cambios confirmados
    fn changes(&self) -> broadcast::Receiver<RouteChange>;
}

/// Canal de difusión de cambios confirmados
#[derive(Debug, Clone)]
pub struct RouteFeed {
    sender: broadcast::Sender<RouteChange>,
}

impl RouteFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publicar un cambio. Sin receptores el cambio simplemente se descarta.
    pub fn publish(&self, change: RouteChange) {
        let receivers = self.sender.send(change).unwrap_or(0);
        tracing::trace!("📣 Cambio {:?} publicado a {} receptores", change, receivers);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouteChange> {
        self.sender.subscribe()
    }
}

impl Default for RouteFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
