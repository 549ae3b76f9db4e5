//! Backend en memoria del Route Store
//!
//! Útil para desarrollo local y tests. Todas las escrituras se serializan
//! detrás de un `RwLock`, de modo que el incremento y el append de una
//! entrega se ven siempre juntos.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::route_store::{RouteFeed, RouteStore};
use crate::models::{Delivery, NewRoute, Route, RouteChange, RoutePatch};
use crate::utils::errors::{StoreError, StoreResult};

#[derive(Debug)]
struct StoredRoute {
    // Orden de inserción, desempata rutas creadas en el mismo instante
    seq: u64,
    route: Route,
}

#[derive(Debug, Default)]
struct Inner {
    routes: HashMap<Uuid, StoredRoute>,
    next_seq: u64,
}

pub struct InMemoryRouteStore {
    inner: RwLock<Inner>,
    feed: RouteFeed,
}

impl InMemoryRouteStore {
    pub fn new() -> Self {
        Self::with_feed(RouteFeed::default())
    }

    pub fn with_feed(feed: RouteFeed) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            feed,
        }
    }
}

impl Default for InMemoryRouteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteStore for InMemoryRouteStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, new_route: NewRoute) -> StoreResult<Route> {
        let route = Route::from_new(new_route);
        {
            let mut inner = self.inner.write().await;
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.routes.insert(route.id, StoredRoute { seq, route: route.clone() });
        }
        self.feed.publish(RouteChange::Created(route.id));
        Ok(route)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Route>> {
        let inner = self.inner.read().await;
        Ok(inner.routes.get(&id).map(|stored| stored.route.clone()))
    }

    async fn list(&self) -> StoreResult<Vec<Route>> {
        let inner = self.inner.read().await;
        let mut stored: Vec<&StoredRoute> = inner.routes.values().collect();
        stored.sort_by(|a, b| {
            b.route
                .created_at
                .cmp(&a.route.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        Ok(stored.into_iter().map(|s| s.route.clone()).collect())
    }

    async fn update(&self, id: Uuid, patch: RoutePatch) -> StoreResult<Route> {
        let route = {
            let mut inner = self.inner.write().await;
            let stored = inner.routes.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            stored.route.apply_patch(&patch);
            stored.route.clone()
        };
        self.feed.publish(RouteChange::Updated(id));
        Ok(route)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let removed = self.inner.write().await.routes.remove(&id).is_some();
        if removed {
            self.feed.publish(RouteChange::Deleted(id));
        }
        Ok(removed)
    }

    async fn append_delivery(&self, id: Uuid, delivery: Delivery) -> StoreResult<Route> {
        let route = {
            let mut inner = self.inner.write().await;
            let stored = inner.routes.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            if !stored.route.push_delivery(delivery) {
                return Err(StoreError::OverDelivery {
                    route_id: id,
                    package_count: stored.route.package_count,
                });
            }
            stored.route.clone()
        };
        self.feed.publish(RouteChange::Updated(id));
        Ok(route)
    }

    fn changes(&self) -> broadcast::Receiver<RouteChange> {
        self.feed.subscribe()
    }
}
