//! Servicio de rutas
//!
//! Punto de entrada de las operaciones del Route Store: valida entradas,
//! sube la foto antes de registrar la entrega, mantiene el cache de la lista
//! y expone las suscripciones en vivo.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::photo_storage::{PhotoPayload, PhotoStorage};
use super::route_watch::{RouteWatch, Subscription};
use crate::cache::RouteListCache;
use crate::models::{Delivery, NewRoute, Route, RoutePatch};
use crate::repositories::RouteStore;
use crate::utils::errors::{StoreError, StoreResult};
use crate::utils::validation::normalize_note;

#[derive(Clone)]
pub struct RouteService {
    store: Arc<dyn RouteStore>,
    photos: Arc<dyn PhotoStorage>,
    cache: Option<RouteListCache>,
}

impl RouteService {
    pub fn new(store: Arc<dyn RouteStore>, photos: Arc<dyn PhotoStorage>) -> Self {
        Self {
            store,
            photos,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: RouteListCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn cache(&self) -> Option<&RouteListCache> {
        self.cache.as_ref()
    }

    /// Crear una ruta nueva con `deliveredCount = 0`
    pub async fn create_route(
        &self,
        stop_count: i64,
        package_count: i64,
        route_date: Option<NaiveDate>,
    ) -> StoreResult<Route> {
        let new_route = NewRoute::new(stop_count, package_count, route_date)?;
        let route = self.store.create(new_route).await?;
        self.invalidate_cache().await;

        info!(
            "🆕 Ruta {} creada: {} paradas, {} paquetes",
            route.id, route.stop_count, route.package_count
        );
        Ok(route)
    }

    pub async fn get_route(&self, id: Uuid) -> StoreResult<Route> {
        self.store.get(id).await?.ok_or(StoreError::NotFound(id))
    }

    /// Todas las rutas, la más reciente primero
    pub async fn list_routes(&self) -> StoreResult<Vec<Route>> {
        let Some(cache) = &self.cache else {
            return self.store.list().await;
        };

        // La generación se lee antes que el store
        let generation = cache.generation().await;
        if let Some(generation) = generation {
            if let Some(routes) = cache.get_snapshot(generation).await {
                return Ok(routes);
            }
        }

        let routes = self.store.list().await?;
        if let Some(generation) = generation {
            cache.store_snapshot(generation, &routes).await;
        }
        Ok(routes)
    }

    pub async fn update_route(&self, id: Uuid, patch: RoutePatch) -> StoreResult<Route> {
        let route = self.store.update(id, patch).await?;
        self.invalidate_cache().await;

        info!("✏️ Ruta {} actualizada", id);
        Ok(route)
    }

    /// Borrar una ruta. Borrar una ruta inexistente no es un error.
    pub async fn delete_route(&self, id: Uuid) -> StoreResult<()> {
        if self.store.delete(id).await? {
            self.invalidate_cache().await;
            info!("🗑️ Ruta {} eliminada", id);
        } else {
            debug!("🗑️ Ruta {} no existía, nada que eliminar", id);
        }
        Ok(())
    }

    /// Registrar una entrega: sube la foto y luego incrementa el contador y
    /// añade la entrega en una sola escritura.
    pub async fn register_delivery(
        &self,
        id: Uuid,
        photo: Option<PhotoPayload>,
        note: Option<String>,
    ) -> StoreResult<Route> {
        let note = normalize_note(note)?;

        // No subir fotos para rutas inexistentes o ya completas
        let current = self.get_route(id).await?;
        if current.is_complete() {
            return Err(StoreError::OverDelivery {
                route_id: id,
                package_count: current.package_count,
            });
        }

        let photo_url = match photo {
            Some(photo) => Some(self.photos.upload(photo).await?),
            None => None,
        };

        let delivery = Delivery::new(photo_url.clone(), note)?;
        let route = match self.store.append_delivery(id, delivery).await {
            Ok(route) => route,
            Err(e) => {
                if let Some(url) = photo_url {
                    warn!("⚠️ Entrega no registrada, la foto {} queda huérfana: {}", url, e);
                }
                return Err(e);
            }
        };
        self.invalidate_cache().await;

        info!(
            "📦 Entrega registrada en ruta {}: {}/{}",
            id, route.delivered_count, route.package_count
        );
        if route.is_complete() {
            info!("🏁 Ruta {} completada", id);
        }
        Ok(route)
    }

    /// Observar la colección como una secuencia de snapshots
    pub fn watch(&self) -> RouteWatch {
        RouteWatch::new(Arc::clone(&self.store))
    }

    /// Registrar un callback que recibe el snapshot completo al suscribirse y
    /// después de cada cambio. Debe llamarse dentro de un runtime de tokio.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&[Route]) + Send + 'static,
    {
        Subscription::spawn(self.watch(), callback)
    }

    async fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate().await;
        }
    }
}
