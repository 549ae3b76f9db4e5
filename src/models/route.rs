//! Modelo de Route
//!
//! Este módulo contiene el struct Route, sus entregas y las entradas
//! validadas para crear o modificar rutas. Los nombres serializados
//! (`stopCount`, `packageCount`, ...) son el formato persistido y no deben
//! cambiar.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::errors::StoreResult;
use crate::utils::validation::{normalize_note, validate_count};

/// Estado derivado de la ruta, nunca se persiste
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    InProgress,
    Complete,
}

/// Una entrega registrada dentro de una ruta
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub photo_url: Option<String>,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Delivery {
    pub fn new(photo_url: Option<String>, note: Option<String>) -> StoreResult<Self> {
        Ok(Self {
            photo_url,
            note: normalize_note(note)?,
            recorded_at: Utc::now(),
        })
    }
}

/// Route principal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub stop_count: i32,
    pub package_count: i32,
    pub delivered_count: i32,
    pub deliveries: Vec<Delivery>,
    pub route_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    /// Construir una ruta recién creada a partir de una entrada validada
    pub fn from_new(new_route: NewRoute) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            stop_count: new_route.stop_count,
            package_count: new_route.package_count,
            delivered_count: 0,
            deliveries: Vec::new(),
            route_date: new_route.route_date.unwrap_or_else(|| now.date_naive()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> RouteStatus {
        if self.delivered_count < self.package_count {
            RouteStatus::InProgress
        } else {
            RouteStatus::Complete
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == RouteStatus::Complete
    }

    /// Porcentaje de progreso redondeado al entero más cercano
    pub fn progress_percent(&self) -> u8 {
        if self.package_count <= 0 {
            return 0;
        }
        let delivered = i64::from(self.delivered_count.clamp(0, self.package_count));
        let total = i64::from(self.package_count);
        ((delivered * 200 + total) / (total * 2)) as u8
    }

    /// Aplicar un patch ya validado y refrescar `updated_at`
    pub fn apply_patch(&mut self, patch: &RoutePatch) {
        if let Some(stop_count) = patch.stop_count {
            self.stop_count = stop_count;
        }
        if let Some(route_date) = patch.route_date {
            self.route_date = route_date;
        }
        self.updated_at = Utc::now();
    }

    /// Añadir una entrega respetando `delivered_count <= package_count`
    pub fn push_delivery(&mut self, delivery: Delivery) -> bool {
        if self.is_complete() {
            return false;
        }
        self.delivered_count += 1;
        self.updated_at = delivery.recorded_at.max(self.updated_at);
        self.deliveries.push(delivery);
        true
    }
}

/// Entrada validada para crear una ruta
#[derive(Debug, Clone, PartialEq)]
pub struct NewRoute {
    pub stop_count: i32,
    pub package_count: i32,
    pub route_date: Option<NaiveDate>,
}

impl NewRoute {
    pub fn new(stop_count: i64, package_count: i64, route_date: Option<NaiveDate>) -> StoreResult<Self> {
        Ok(Self {
            stop_count: validate_count("stopCount", stop_count)?,
            package_count: validate_count("packageCount", package_count)?,
            route_date,
        })
    }
}

/// Campos mutables de una ruta
///
/// `packageCount` queda fijo al crear la ruta y `deliveredCount` solo avanza
/// registrando entregas, así que ninguno de los dos aparece aquí.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutePatch {
    pub stop_count: Option<i32>,
    pub route_date: Option<NaiveDate>,
}

impl RoutePatch {
    pub fn new(stop_count: Option<i64>, route_date: Option<NaiveDate>) -> StoreResult<Self> {
        let stop_count = match stop_count {
            Some(value) => Some(validate_count("stopCount", value)?),
            None => None,
        };
        Ok(Self { stop_count, route_date })
    }

    pub fn is_empty(&self) -> bool {
        self.stop_count.is_none() && self.route_date.is_none()
    }
}
