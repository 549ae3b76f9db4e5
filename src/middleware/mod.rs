//! Middleware
//!
//! Este módulo contiene el middleware HTTP de la aplicación.

pub mod cors;

pub use cors::{cors_middleware, cors_middleware_with_origins};
