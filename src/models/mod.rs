//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos de rutas y entregas, y los
//! eventos de cambio que publica el Route Store.

pub mod route;
pub mod route_change;

pub use route::{Delivery, NewRoute, Route, RoutePatch, RouteStatus};
pub use route_change::RouteChange;
