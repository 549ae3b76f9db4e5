//! Delivery Tracker
//!
//! Backend de seguimiento de rutas de entrega: un usuario crea una ruta con
//! un número de paradas y de paquetes, y registra entregas (con foto y
//! observación opcionales) hasta completarla.

pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
