//! DTOs de la API
//!
//! Requests y responses JSON de los endpoints de rutas.

pub mod route_dto;
