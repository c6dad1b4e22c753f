//! Motor de autorización de despachos
//!
//! Recibe los pedidos de transporte ya normalizados, los agrupa en
//! despachos por vehículo, calcula su costo teórico contra las tarifas
//! SICETAC y decide en qué nivel se autoriza cada despacho. Expone
//! además los operadores de ajuste, fusión y división y la exportación
//! a la plantilla de facturación.

pub mod cache;
pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod utils;

pub use state::DispatchEngine;
pub use utils::errors::{EngineError, EngineResult};
