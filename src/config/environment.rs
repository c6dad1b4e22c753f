//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno del motor de despachos.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    /// Porcentaje sobre el teórico hasta el cual autoriza un coordinador
    pub umbral_coordinador: Decimal,
    /// TTL del cache de tarifas en segundos
    pub tarifa_cache_ttl: u64,
    /// Máximo de entradas en el cache de tarifas
    pub tarifa_cache_max: usize,
    /// Tiempo límite por solicitud, en milisegundos
    pub request_timeout_ms: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            umbral_coordinador: env::var("UMBRAL_COORDINADOR")
                .ok()
                .and_then(|v| Decimal::from_str(&v).ok())
                .unwrap_or_else(|| Decimal::new(70, 1)),
            tarifa_cache_ttl: env::var("TARIFA_CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            tarifa_cache_max: env::var("TARIFA_CACHE_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
        }
    }
}

impl EnvironmentConfig {
    /// Configuración fija para pruebas, sin depender del entorno
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            umbral_coordinador: Decimal::new(70, 1),
            tarifa_cache_ttl: 600,
            tarifa_cache_max: 500,
            request_timeout_ms: 10_000,
        }
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_tests_threshold_is_seven_percent() {
        let config = EnvironmentConfig::for_tests();
        assert_eq!(config.umbral_coordinador, Decimal::new(70, 1));
        assert!(!config.is_production());
    }

    #[test]
    fn test_variables_ausentes_usan_los_valores_por_defecto() {
        for var in [
            "ENVIRONMENT",
            "UMBRAL_COORDINADOR",
            "TARIFA_CACHE_TTL",
            "TARIFA_CACHE_MAX",
            "REQUEST_TIMEOUT_MS",
        ] {
            env::remove_var(var);
        }
        let config = EnvironmentConfig::default();
        assert_eq!(config.environment, "development");
        assert_eq!(config.umbral_coordinador, Decimal::new(70, 1));
        assert_eq!(config.tarifa_cache_ttl, 600);
        assert_eq!(config.tarifa_cache_max, 500);
        assert_eq!(config.request_timeout_ms, 10_000);
    }
}
