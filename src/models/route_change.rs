//! Eventos de cambio de la colección de rutas

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cambio confirmado en la colección de rutas
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "routeId", rename_all = "snake_case")]
pub enum RouteChange {
    Created(Uuid),
    Updated(Uuid),
    Deleted(Uuid),
    /// Se pudieron perder notificaciones; los observadores deben releer todo
    Resync,
}

impl RouteChange {
    pub fn route_id(&self) -> Option<Uuid> {
        match self {
            RouteChange::Created(id) | RouteChange::Updated(id) | RouteChange::Deleted(id) => Some(*id),
            RouteChange::Resync => None,
        }
    }
}
