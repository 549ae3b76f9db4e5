//! Backend PostgreSQL del Route Store
//!
//! Las entregas se guardan como un array JSONB en la propia fila de la ruta.
//! Registrar una entrega es un único `UPDATE` condicionado a
//! `delivered_count < package_count`, así que dos registros concurrentes
//! nunca pierden un incremento ni superan el total de paquetes.
//!
//! Cada escritura emite `pg_notify` dentro de su transacción; el listener
//! reenvía al feed local los cambios confirmados por otros procesos.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgListener, PgPool};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::route_store::{RouteFeed, RouteStore};
use crate::models::{Delivery, NewRoute, Route, RouteChange, RoutePatch};
use crate::utils::errors::{StoreError, StoreResult};

/// Canal LISTEN/NOTIFY de cambios de rutas
pub const CHANGES_CHANNEL: &str = "route_changes";

/// Fila de la tabla routes
#[derive(Debug, sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    stop_count: i32,
    package_count: i32,
    delivered_count: i32,
    deliveries: Json<Vec<Delivery>>,
    route_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Self {
            id: row.id,
            stop_count: row.stop_count,
            package_count: row.package_count,
            delivered_count: row.delivered_count,
            deliveries: row.deliveries.0,
            route_date: row.route_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Payload de NOTIFY
#[derive(Debug, Serialize, Deserialize)]
struct ChangeNotification {
    origin: Uuid,
    change: RouteChange,
}

pub struct PgRouteStore {
    pool: PgPool,
    feed: RouteFeed,
    // Identifica las notificaciones emitidas por este proceso
    instance_id: Uuid,
}

impl PgRouteStore {
    pub fn new(pool: PgPool, feed: RouteFeed) -> Self {
        Self {
            pool,
            feed,
            instance_id: Uuid::new_v4(),
        }
    }

    /// Escuchar los cambios confirmados por otros procesos.
    ///
    /// La conexión inicial se hace antes de devolver, para que un fallo de
    /// configuración llegue al llamador.
    pub async fn start_listener(&self) -> StoreResult<JoinHandle<()>> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGES_CHANNEL).await?;
        info!("👂 Escuchando cambios de rutas en el canal '{}'", CHANGES_CHANNEL);

        let feed = self.feed.clone();
        let instance_id = self.instance_id;

        Ok(tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<ChangeNotification>(notification.payload()) {
                            Ok(n) if n.origin == instance_id => {}
                            Ok(n) => {
                                debug!("📥 Cambio remoto recibido: {:?}", n.change);
                                feed.publish(n.change);
                            }
                            Err(e) => warn!("⚠️ Notificación de ruta ilegible: {}", e),
                        }
                    }
                    Err(e) => {
                        // recv() reconecta en la siguiente llamada; lo perdido mientras
                        // tanto se recupera releyendo la colección
                        warn!("⚠️ Listener de rutas desconectado: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        feed.publish(RouteChange::Resync);
                    }
                }
            }
        }))
    }

    async fn notify(&self, tx: &mut Transaction<'_, Postgres>, change: RouteChange) -> StoreResult<()> {
        let payload = serde_json::to_string(&ChangeNotification {
            origin: self.instance_id,
            change,
        })
        .map_err(|e| StoreError::BackingStore(format!("Error serializing notification: {}", e)))?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CHANGES_CHANNEL)
            .bind(payload)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl RouteStore for PgRouteStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, new_route: NewRoute) -> StoreResult<Route> {
        let route = Route::from_new(new_route);
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RouteRow>(
            r#"
            INSERT INTO routes (id, stop_count, package_count, delivered_count, deliveries, route_date, created_at, updated_at)
            VALUES ($1, $2, $3, 0, '[]'::jsonb, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(route.id)
        .bind(route.stop_count)
        .bind(route.package_count)
        .bind(route.route_date)
        .bind(route.created_at)
        .bind(route.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        self.notify(&mut tx, RouteChange::Created(row.id)).await?;
        tx.commit().await?;

        self.feed.publish(RouteChange::Created(row.id));
        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Route>> {
        let row = sqlx::query_as::<_, RouteRow>("SELECT * FROM routes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Route::from))
    }

    async fn list(&self) -> StoreResult<Vec<Route>> {
        let rows = sqlx::query_as::<_, RouteRow>(
            "SELECT * FROM routes ORDER BY created_at DESC, id DESC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Route::from).collect())
    }

    async fn update(&self, id: Uuid, patch: RoutePatch) -> StoreResult<Route> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RouteRow>(
            r#"
            UPDATE routes
            SET stop_count = COALESCE($2, stop_count),
                route_date = COALESCE($3, route_date),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(patch.stop_count)
        .bind(patch.route_date)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        self.notify(&mut tx, RouteChange::Updated(id)).await?;
        tx.commit().await?;

        self.feed.publish(RouteChange::Updated(id));
        Ok(row.into())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM routes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.notify(&mut tx, RouteChange::Deleted(id)).await?;
        }
        tx.commit().await?;

        if removed {
            self.feed.publish(RouteChange::Deleted(id));
        }
        Ok(removed)
    }

    async fn append_delivery(&self, id: Uuid, delivery: Delivery) -> StoreResult<Route> {
        let mut tx = self.pool.begin().await?;
        let recorded_at = delivery.recorded_at;

        let row = sqlx::query_as::<_, RouteRow>(
            r#"
            UPDATE routes
            SET delivered_count = delivered_count + 1,
                deliveries = deliveries || jsonb_build_array($2::jsonb),
                updated_at = GREATEST(updated_at, $3)
            WHERE id = $1 AND delivered_count < package_count
            RETURNING *
            "#
        )
        .bind(id)
        .bind(Json(&delivery))
        .bind(recorded_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            // Distinguir ruta inexistente de ruta completa; la transacción se descarta
            let package_count: Option<i32> =
                sqlx::query_scalar("SELECT package_count FROM routes WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match package_count {
                Some(package_count) => StoreError::OverDelivery { route_id: id, package_count },
                None => StoreError::NotFound(id),
            });
        };

        self.notify(&mut tx, RouteChange::Updated(id)).await?;
        tx.commit().await.map_err(|e| {
            error!("❌ Error confirmando entrega en ruta {}: {}", id, e);
            StoreError::from(e)
        })?;

        self.feed.publish(RouteChange::Updated(id));
        Ok(row.into())
    }

    fn changes(&self) -> broadcast::Receiver<RouteChange> {
        self.feed.subscribe()
    }
}
