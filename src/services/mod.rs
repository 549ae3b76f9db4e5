//! Services module
//!
//! Este módulo contiene la lógica de negocio de rutas y entregas, el
//! almacenamiento de fotos y las suscripciones en vivo.

pub mod photo_storage;
pub mod route_service;
pub mod route_watch;

pub use photo_storage::{HttpPhotoStorage, LocalPhotoStorage, PhotoPayload, PhotoStorage};
pub use route_service::RouteService;
pub use route_watch::{RouteWatch, Subscription};
