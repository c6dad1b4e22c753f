//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! normalización de ciudades, consecutivos y candados por vehículo.

pub mod city;
pub mod consecutivos;
pub mod errors;
pub mod locks;
pub mod validation;
