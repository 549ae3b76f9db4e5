use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Delivery, Route, RoutePatch, RouteStatus};
use crate::services::PhotoPayload;
use crate::utils::errors::{validation_error, AppError};

// Request para crear una ruta
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRequest {
    #[validate(range(min = 1, max = 2147483647))]
    pub stop_count: i64,

    #[validate(range(min = 1, max = 2147483647))]
    pub package_count: i64,

    pub route_date: Option<NaiveDate>,
}

// Request para actualizar una ruta
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRouteRequest {
    #[validate(range(min = 1, max = 2147483647))]
    pub stop_count: Option<i64>,

    pub route_date: Option<NaiveDate>,

    // Campos inmutables: se aceptan solo para rechazarlos con un error claro
    pub package_count: Option<i64>,
    pub delivered_count: Option<i64>,
}

impl UpdateRouteRequest {
    pub fn into_patch(self) -> Result<RoutePatch, AppError> {
        if self.package_count.is_some() {
            return Err(validation_error("packageCount", "packageCount is fixed at creation"));
        }
        if self.delivered_count.is_some() {
            return Err(validation_error(
                "deliveredCount",
                "deliveredCount only changes by registering deliveries",
            ));
        }
        Ok(RoutePatch::new(self.stop_count, self.route_date)?)
    }
}

// Request para registrar una entrega. La nota se recorta y se valida en el servicio.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeliveryRequest {
    /// Foto codificada en base64
    pub photo: Option<String>,
    pub photo_content_type: Option<String>,
    pub note: Option<String>,
}

impl RegisterDeliveryRequest {
    /// Decodificar la foto, si viene
    pub fn photo_payload(&self) -> Result<Option<PhotoPayload>, AppError> {
        let Some(encoded) = self.photo.as_deref().map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(None);
        };

        // Admite tanto base64 pelado como data URLs (data:image/jpeg;base64,...)
        let (content_type, data) = match encoded.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,")) {
            Some((mime, data)) => (Some(mime.to_string()), data),
            None => (None, encoded),
        };

        let bytes = STANDARD
            .decode(data)
            .map_err(|_| validation_error("photo", "photo must be base64 encoded"))?;

        Ok(Some(PhotoPayload::new(
            bytes,
            self.photo_content_type.clone().or(content_type),
        )))
    }
}

// Entrega dentro de la respuesta
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub photo_url: Option<String>,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<Delivery> for DeliveryResponse {
    fn from(delivery: Delivery) -> Self {
        Self {
            photo_url: delivery.photo_url,
            note: delivery.note,
            recorded_at: delivery.recorded_at,
        }
    }
}

// Response de ruta
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub id: Uuid,
    pub stop_count: i32,
    pub package_count: i32,
    pub delivered_count: i32,
    pub status: RouteStatus,
    pub progress_percent: u8,
    pub route_date: NaiveDate,
    pub deliveries: Vec<DeliveryResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Route> for RouteResponse {
    fn from(route: Route) -> Self {
        Self {
            id: route.id,
            stop_count: route.stop_count,
            package_count: route.package_count,
            delivered_count: route.delivered_count,
            status: route.status(),
            progress_percent: route.progress_percent(),
            route_date: route.route_date,
            deliveries: route.deliveries.into_iter().map(DeliveryResponse::from).collect(),
            created_at: route.created_at,
            updated_at: route.updated_at,
        }
    }
}

// Response genérica
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_validation() {
        let request: CreateRouteRequest =
            serde_json::from_value(json!({ "stopCount": 5, "packageCount": 0 })).unwrap();
        assert!(request.validate().is_err());

        let request: CreateRouteRequest =
            serde_json::from_value(json!({ "stopCount": 5, "packageCount": 10, "routeDate": "2025-03-14" })).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.route_date, NaiveDate::from_ymd_opt(2025, 3, 14));
    }

    #[test]
    fn test_update_rejects_immutable_fields() {
        let request: UpdateRouteRequest =
            serde_json::from_value(json!({ "packageCount": 20 })).unwrap();
        assert!(request.into_patch().is_err());

        let request: UpdateRouteRequest =
            serde_json::from_value(json!({ "stopCount": 7 })).unwrap();
        assert_eq!(request.into_patch().unwrap().stop_count, Some(7));
    }

    #[test]
    fn test_photo_payload_decoding() {
        let request = RegisterDeliveryRequest {
            photo: Some(format!("data:image/png;base64,{}", STANDARD.encode([1u8, 2, 3]))),
            photo_content_type: None,
            note: None,
        };
        let photo = request.photo_payload().unwrap().unwrap();
        assert_eq!(photo.bytes, vec![1, 2, 3]);
        assert_eq!(photo.content_type, "image/png");

        let request = RegisterDeliveryRequest {
            photo: Some("not base64!!".to_string()),
            photo_content_type: None,
            note: None,
        };
        assert!(request.photo_payload().is_err());

        let request = RegisterDeliveryRequest { photo: None, photo_content_type: None, note: None };
        assert!(request.photo_payload().unwrap().is_none());
    }

    #[test]
    fn test_route_response_includes_derived_fields() {
        let route = Route::from_new(crate::models::NewRoute::new(5, 10, None).unwrap());
        let value = serde_json::to_value(RouteResponse::from(route)).unwrap();
        assert_eq!(value["status"], "in_progress");
        assert_eq!(value["progressPercent"], 0);
        assert_eq!(value["deliveredCount"], 0);
    }
}
