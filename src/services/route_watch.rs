//! Suscripciones en vivo a la colección de rutas
//!
//! `RouteWatch` entrega el snapshot completo (más reciente primero) al
//! suscribirse y después de cada cambio confirmado. Los cambios que llegan
//! en ráfaga se agrupan en un único snapshot.
//!
//! `Subscription` es la forma con callback: una tarea de tokio conduce un
//! `RouteWatch` e invoca el callback hasta que se cancela el handle.

use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{Route, RouteChange};
use crate::repositories::RouteStore;
use crate::utils::errors::StoreResult;

pub struct RouteWatch {
    store: Arc<dyn RouteStore>,
    changes: broadcast::Receiver<RouteChange>,
    initial_sent: bool,
}

impl RouteWatch {
    pub fn new(store: Arc<dyn RouteStore>) -> Self {
        // Suscribirse antes del primer list para no perder cambios intermedios
        let changes = store.changes();
        Self {
            store,
            changes,
            initial_sent: false,
        }
    }

    /// Esperar el siguiente snapshot. `None` cuando el store deja de publicar.
    pub async fn next(&mut self) -> Option<StoreResult<Vec<Route>>> {
        if !self.initial_sent {
            self.initial_sent = true;
            return Some(self.store.list().await);
        }

        match self.changes.recv().await {
            Ok(change) => debug!("🔔 Cambio de rutas: {:?}", change),
            Err(RecvError::Lagged(skipped)) => {
                debug!("🔔 Observador atrasado, {} cambios omitidos", skipped)
            }
            Err(RecvError::Closed) => return None,
        }
        self.drain_pending();

        Some(self.store.list().await)
    }

    fn drain_pending(&mut self) {
        loop {
            match self.changes.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Convertir en un `Stream` de snapshots
    pub fn into_stream(self) -> impl Stream<Item = StoreResult<Vec<Route>>> + Send {
        stream::unfold(self, |mut watch| async move {
            watch.next().await.map(|snapshot| (snapshot, watch))
        })
    }
}

type SnapshotCallback = Box<dyn FnMut(&[Route]) + Send + 'static>;

/// Handle de una suscripción con callback.
///
/// `cancel` es idempotente y, cuando retorna, el callback ya no se volverá a
/// invocar. No debe llamarse desde dentro del propio callback. Soltar el
/// handle también cancela la suscripción.
pub struct Subscription {
    callback: Arc<Mutex<Option<SnapshotCallback>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    pub fn spawn<F>(mut watch: RouteWatch, callback: F) -> Self
    where
        F: FnMut(&[Route]) + Send + 'static,
    {
        let callback: Arc<Mutex<Option<SnapshotCallback>>> = Arc::new(Mutex::new(Some(Box::new(callback))));
        let slot = Arc::clone(&callback);

        let task = tokio::spawn(async move {
            while let Some(snapshot) = watch.next().await {
                let routes = match snapshot {
                    Ok(routes) => routes,
                    Err(e) => {
                        warn!("⚠️ Error en la consulta de rutas: {}", e);
                        continue;
                    }
                };

                let delivered = {
                    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
                    match guard.as_mut() {
                        Some(callback) => {
                            callback(&routes);
                            true
                        }
                        None => false,
                    }
                };
                if !delivered {
                    break;
                }
            }
            debug!("🔕 Suscripción de rutas terminada");
        });

        Self {
            callback,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn cancel(&self) {
        // Tomar el callback espera a que termine una invocación en curso
        let removed = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }

        if removed.is_some() {
            debug!("🔕 Suscripción de rutas cancelada");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRoute;
    use crate::repositories::InMemoryRouteStore;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_watch_sends_initial_snapshot_then_changes() {
        let store: Arc<dyn RouteStore> = Arc::new(InMemoryRouteStore::new());
        let mut watch = RouteWatch::new(Arc::clone(&store));

        let initial = watch.next().await.unwrap().unwrap();
        assert!(initial.is_empty());

        let route = store.create(NewRoute::new(1, 2, None).unwrap()).await.unwrap();
        let snapshot = timeout(Duration::from_secs(1), watch.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, route.id);
    }

    #[tokio::test]
    async fn test_burst_of_changes_is_coalesced() {
        let store: Arc<dyn RouteStore> = Arc::new(InMemoryRouteStore::new());
        let mut watch = RouteWatch::new(Arc::clone(&store));
        watch.next().await.unwrap().unwrap();

        for _ in 0..3 {
            store.create(NewRoute::new(1, 1, None).unwrap()).await.unwrap();
        }

        let snapshot = watch.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 3);
        assert!(timeout(Duration::from_millis(50), watch.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let store: Arc<dyn RouteStore> = Arc::new(InMemoryRouteStore::new());
        let subscription = Subscription::spawn(RouteWatch::new(store), |_| {});
        subscription.cancel();
        subscription.cancel();
        assert!(subscription.is_cancelled());
    }
}
