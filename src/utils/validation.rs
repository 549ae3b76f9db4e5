//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validar las entradas del
//! Route Store antes de cualquier escritura.

use chrono::NaiveDate;
use serde::Serialize;
use validator::ValidationError;

/// Longitud máxima de una observación de entrega
pub const MAX_NOTE_LENGTH: usize = 2000;

/// Validar y convertir string a fecha
pub fn validate_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        let mut error = ValidationError::new("date");
        error.add_param("value".into(), &value.to_string());
        error.add_param("format".into(), &"YYYY-MM-DD".to_string());
        error.message = Some(format!("'{}' is not a YYYY-MM-DD date", value).into());
        error
    })
}

/// Validar que un valor sea positivo
pub fn validate_positive<T: PartialOrd + std::fmt::Display + num_traits::Zero + Serialize>(
    value: T,
) -> Result<(), ValidationError> {
    if value <= T::zero() {
        let mut error = ValidationError::new("positive");
        error.add_param("value".into(), &value);
        return Err(error);
    }
    Ok(())
}

/// Validar un contador de paradas o paquetes
///
/// Debe ser positivo y caber en un `INTEGER` de PostgreSQL.
pub fn validate_count(field: &'static str, value: i64) -> Result<i32, ValidationError> {
    validate_positive(value).map_err(|mut error| {
        error.message = Some(format!("{} must be a positive integer, got {}", field, value).into());
        error
    })?;

    i32::try_from(value).map_err(|_| {
        let mut error = ValidationError::new("range");
        error.add_param("max".into(), &i32::MAX);
        error.add_param("actual".into(), &value);
        error.message = Some(format!("{} must not exceed {}", field, i32::MAX).into());
        error
    })
}

/// Normalizar una observación: se recorta y una cadena vacía equivale a ausencia
pub fn normalize_note(note: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(note) = note else {
        return Ok(None);
    };

    let trimmed = note.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let len = trimmed.chars().count();
    if len > MAX_NOTE_LENGTH {
        let mut error = ValidationError::new("length");
        error.add_param("max".into(), &MAX_NOTE_LENGTH);
        error.add_param("actual".into(), &len);
        error.message = Some(format!("note must not exceed {} characters", MAX_NOTE_LENGTH).into());
        return Err(error);
    }

    Ok(Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_count() {
        assert_eq!(validate_count("stopCount", 5).unwrap(), 5);
        assert!(validate_count("stopCount", 0).is_err());
        assert!(validate_count("packageCount", -3).is_err());
        assert!(validate_count("packageCount", i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn test_validate_count_message_names_field() {
        let error = validate_count("packageCount", 0).unwrap_err();
        let message = error.message.unwrap().to_string();
        assert!(message.contains("packageCount"));
    }

    #[test]
    fn test_validate_date() {
        assert_eq!(
            validate_date("2025-03-14").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        );
        assert!(validate_date("14/03/2025").is_err());
    }

    #[test]
    fn test_normalize_note() {
        assert_eq!(normalize_note(None).unwrap(), None);
        assert_eq!(normalize_note(Some("   ".into())).unwrap(), None);
        assert_eq!(normalize_note(Some("  portão azul ".into())).unwrap(), Some("portão azul".to_string()));
        assert!(normalize_note(Some("x".repeat(MAX_NOTE_LENGTH + 1))).is_err());
    }
}
