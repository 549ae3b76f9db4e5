//! Repositorios
//!
//! Este módulo contiene el trait `RouteStore` y sus backends de persistencia.

pub mod memory_route_store;
pub mod pg_route_store;
pub mod route_store;

pub use memory_route_store::InMemoryRouteStore;
pub use pg_route_store::PgRouteStore;
pub use route_store::{RouteFeed, RouteStore, DEFAULT_FEED_CAPACITY};
