//! Sistema de manejo de errores
//!
//! Este módulo define los errores del Route Store (`StoreError`) y los
//! errores de la API (`AppError`) con su conversión a respuestas HTTP.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errores del Route Store
///
/// Todos se devuelven al llamador de la operación que falló; ninguno se
/// reintenta en esta capa.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Route '{0}' not found")]
    NotFound(Uuid),

    #[error("Route '{route_id}' already has all {package_count} packages delivered")]
    OverDelivery { route_id: Uuid, package_count: i32 },

    #[error("Photo upload failed: {0}")]
    Upload(String),

    #[error("Backing store error: {0}")]
    BackingStore(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::BackingStore(e.to_string())
    }
}

impl From<validator::ValidationError> for StoreError {
    fn from(e: validator::ValidationError) -> Self {
        let message = match e.message {
            Some(message) => message.to_string(),
            None => e.code.to_string(),
        };
        StoreError::Validation(message)
    }
}

/// Resultado tipado para operaciones del Route Store
pub type StoreResult<T> = Result<T, StoreError>;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(rejection.body_text());
        }
        AppError::BadRequest(rejection.body_text())
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl ErrorResponse {
    fn new(error: &str, message: String, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message,
            details: None,
            code: Some(code.to_string()),
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Store(StoreError::Validation(msg)) => {
                tracing::debug!("Validation error: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("Validation Error", msg, "VALIDATION_ERROR"),
                )
            }

            AppError::Store(StoreError::NotFound(id)) => {
                tracing::debug!("Route not found: {}", id);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new(
                        "Not Found",
                        format!("Route with id '{}' not found", id),
                        "NOT_FOUND",
                    ),
                )
            }

            AppError::Store(StoreError::OverDelivery { route_id, package_count }) => {
                tracing::info!("Over-delivery rejected for route {}", route_id);
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::new(
                        "Over Delivery",
                        format!("All {} packages of this route are already delivered", package_count),
                        "OVER_DELIVERY",
                    )
                    .with_details(json!({ "routeId": route_id, "packageCount": package_count })),
                )
            }

            AppError::Store(StoreError::Upload(msg)) => {
                tracing::error!("Photo upload error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::new(
                        "Upload Error",
                        "The delivery photo could not be stored".to_string(),
                        "UPLOAD_ERROR",
                    )
                    .with_details(json!({ "upload_error": msg })),
                )
            }

            AppError::Store(StoreError::BackingStore(msg)) => {
                tracing::error!("Backing store error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "Backing Store Error",
                        "An error occurred while accessing the route store".to_string(),
                        "BACKING_STORE_ERROR",
                    )
                    .with_details(json!({ "store_error": msg })),
                )
            }

            AppError::Validation(e) => {
                tracing::debug!("Validation error: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(
                        "Validation Error",
                        "The provided data is invalid".to_string(),
                        "VALIDATION_ERROR",
                    )
                    .with_details(json!(e)),
                )
            }

            AppError::BadRequest(msg) => {
                tracing::debug!("Bad request: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("Bad Request", msg, "BAD_REQUEST"),
                )
            }

            AppError::PayloadTooLarge(msg) => {
                tracing::warn!("Request body too large: {}", msg);
                (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    ErrorResponse::new("Payload Too Large", msg, "PAYLOAD_TOO_LARGE"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para los handlers HTTP
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: &'static str) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.add_param("field".into(), &field);
    error.add_param("message".into(), &message);

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_status_codes() {
        let id = Uuid::new_v4();
        let cases = vec![
            (StoreError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (StoreError::NotFound(id), StatusCode::NOT_FOUND),
            (StoreError::OverDelivery { route_id: id, package_count: 3 }, StatusCode::CONFLICT),
            (StoreError::Upload("timeout".into()), StatusCode::BAD_GATEWAY),
            (StoreError::BackingStore("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            let response = AppError::from(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_payload_too_large_status() {
        let response = AppError::PayloadTooLarge("length limit exceeded".into()).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_validation_error_helper() {
        let response = validation_error("stopCount", "must be positive").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
