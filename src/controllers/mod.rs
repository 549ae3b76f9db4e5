//! Controladores
//!
//! Traducen los DTOs de la API a operaciones del servicio de rutas.

pub mod route_controller;
