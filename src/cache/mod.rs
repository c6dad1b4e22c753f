//! Cache
//!
//! Este módulo contiene el cache en memoria de tarifas y otros costos.

pub mod tarifa_cache;

pub use tarifa_cache::{CacheStats, TarifaCache};
