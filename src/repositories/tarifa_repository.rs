//! Repositorio de tarifas y otros costos
//!
//! El almacén real de tarifas vive fuera del motor; aquí se define el
//! contrato de solo lectura y una implementación en memoria para pruebas
//! y para el binario de demostración. Las consultas fallan cerradas: si la
//! tarifa no existe, el error detiene la operación completa.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::tarifa::{OtrosCostos, Tarifa};
use crate::utils::city::city_key;
use crate::utils::errors::{EngineError, EngineResult};

/// Contrato de consulta del almacén de tarifas
#[async_trait]
pub trait TariffStore: Send + Sync {
    /// Tarifa de un par origen-destino; error `TARIFF_MISSING` si no existe
    async fn tariff(&self, origin: &str, destination: &str) -> EngineResult<Tarifa>;

    /// Otros costos por tipo de vehículo; error `OTHER_COSTS_MISSING` si no existe
    async fn other_costs(&self, vehicle_type: &str) -> EngineResult<OtrosCostos>;
}

/// Implementación en memoria del almacén de tarifas
#[derive(Default)]
pub struct MemoryTariffStore {
    tarifas: RwLock<HashMap<(String, String), Tarifa>>,
    otros_costos: RwLock<HashMap<String, OtrosCostos>>,
}

impl MemoryTariffStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_tarifa(&self, tarifa: Tarifa) {
        let key = (city_key(&tarifa.origen), city_key(&tarifa.destino));
        self.tarifas.write().await.insert(key, tarifa);
    }

    pub async fn insert_otros_costos(&self, costos: OtrosCostos) {
        let key = costos.tipo_vehiculo.trim().to_uppercase();
        self.otros_costos.write().await.insert(key, costos);
    }
}

#[async_trait]
impl TariffStore for MemoryTariffStore {
    async fn tariff(&self, origin: &str, destination: &str) -> EngineResult<Tarifa> {
        let key = (city_key(origin), city_key(destination));
        self.tarifas
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::TarifaNoEncontrada {
                origen: origin.to_string(),
                destino: destination.to_string(),
            })
    }

    async fn other_costs(&self, vehicle_type: &str) -> EngineResult<OtrosCostos> {
        let key = vehicle_type.trim().to_uppercase();
        self.otros_costos
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::OtrosCostosNoEncontrados(vehicle_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn tarifa_cali_bogota() -> Tarifa {
        let mut base = HashMap::new();
        base.insert("TURBO".to_string(), Decimal::from(1_000_000));
        Tarifa {
            origen: "CALI".into(),
            destino: "BOGOTA".into(),
            base,
            paga_cargue_descargue: true,
            equivalencia_centro_costo: "CC-01".into(),
        }
    }

    #[tokio::test]
    async fn test_lookup_insensible_a_tildes() {
        let store = MemoryTariffStore::new();
        store.insert_tarifa(tarifa_cali_bogota()).await;

        let tarifa = store.tariff("Cali", "Bogotá").await.unwrap();
        assert_eq!(tarifa.base_para("TURBO"), Some(Decimal::from(1_000_000)));
    }

    #[tokio::test]
    async fn test_tarifa_faltante_falla_cerrada() {
        let store = MemoryTariffStore::new();
        let err = store.tariff("CALI", "PASTO").await.unwrap_err();
        assert_eq!(err.kind(), "TARIFF_MISSING");
    }

    #[tokio::test]
    async fn test_otros_costos_faltantes() {
        let store = MemoryTariffStore::new();
        store
            .insert_otros_costos(OtrosCostos {
                tipo_vehiculo: "TURBO".into(),
                valor_punto_adicional: Decimal::from(70_000),
                valor_cargue_descargue: Decimal::from(100_000),
            })
            .await;

        assert!(store.other_costs("turbo").await.is_ok());
        let err = store.other_costs("NHR").await.unwrap_err();
        assert_eq!(err.kind(), "OTHER_COSTS_MISSING");
    }
}
