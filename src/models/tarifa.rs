//! Tarifas y otros costos
//!
//! Este módulo contiene la tarifa base por par origen-destino, los otros
//! costos por tipo de vehículo y la escala SICETAC de kilos a tipo de
//! vehículo usada al dividir un despacho.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tipos de vehículo de la escala SICETAC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoVehiculo {
    Nhr,
    Turbo,
    Nies,
    Sencillo,
    Patineta,
    Tractomula,
}

impl TipoVehiculo {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoVehiculo::Nhr => "NHR",
            TipoVehiculo::Turbo => "TURBO",
            TipoVehiculo::Nies => "NIES",
            TipoVehiculo::Sencillo => "SENCILLO",
            TipoVehiculo::Patineta => "PATINETA",
            TipoVehiculo::Tractomula => "TRACTOMULA",
        }
    }

    /// Tipo de vehículo según los kilos SICETAC totales del despacho.
    /// Escala: ≤2300 NHR, ≤4500 TURBO, ≤6100 NIES, ≤9000 SENCILLO,
    /// ≤17000 PATINETA, más TRACTOMULA.
    pub fn from_kilos_sicetac(kilos: Decimal) -> Self {
        if kilos <= Decimal::from(2_300) {
            TipoVehiculo::Nhr
        } else if kilos <= Decimal::from(4_500) {
            TipoVehiculo::Turbo
        } else if kilos <= Decimal::from(6_100) {
            TipoVehiculo::Nies
        } else if kilos <= Decimal::from(9_000) {
            TipoVehiculo::Sencillo
        } else if kilos <= Decimal::from(17_000) {
            TipoVehiculo::Patineta
        } else {
            TipoVehiculo::Tractomula
        }
    }
}

/// Tarifa de un par origen-destino.
/// `base` mapea tipo de vehículo (en mayúsculas) a la tarifa base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tarifa {
    pub origen: String,
    pub destino: String,
    pub base: HashMap<String, Decimal>,
    /// Si el par paga cargue y descargue
    pub paga_cargue_descargue: bool,
    /// Código de equivalencia de centro de costo para contabilidad
    pub equivalencia_centro_costo: String,
}

impl Tarifa {
    /// Tarifa base para un tipo de vehículo, insensible a mayúsculas
    pub fn base_para(&self, tipo_vehiculo: &str) -> Option<Decimal> {
        self.base.get(&tipo_vehiculo.trim().to_uppercase()).copied()
    }
}

/// Otros costos por tipo de vehículo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtrosCostos {
    pub tipo_vehiculo: String,
    /// Valor de cada punto de entrega adicional al primero
    pub valor_punto_adicional: Decimal,
    /// Tarifa de cargue y descargue
    pub valor_cargue_descargue: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escala_sicetac() {
        assert_eq!(
            TipoVehiculo::from_kilos_sicetac(Decimal::from(2_300)),
            TipoVehiculo::Nhr
        );
        assert_eq!(
            TipoVehiculo::from_kilos_sicetac(Decimal::from(4_000)),
            TipoVehiculo::Turbo
        );
        assert_eq!(
            TipoVehiculo::from_kilos_sicetac(Decimal::from(6_000)),
            TipoVehiculo::Nies
        );
        assert_eq!(
            TipoVehiculo::from_kilos_sicetac(Decimal::from(8_999)),
            TipoVehiculo::Sencillo
        );
        assert_eq!(
            TipoVehiculo::from_kilos_sicetac(Decimal::from(17_000)),
            TipoVehiculo::Patineta
        );
        assert_eq!(
            TipoVehiculo::from_kilos_sicetac(Decimal::from(17_001)),
            TipoVehiculo::Tractomula
        );
    }

    #[test]
    fn test_base_para_insensible_a_mayusculas() {
        let mut base = HashMap::new();
        base.insert("TURBO".to_string(), Decimal::from(1_000_000));
        let tarifa = Tarifa {
            origen: "CALI".into(),
            destino: "BOGOTA".into(),
            base,
            paga_cargue_descargue: true,
            equivalencia_centro_costo: "CC-01".into(),
        };
        assert_eq!(tarifa.base_para("turbo"), Some(Decimal::from(1_000_000)));
        assert_eq!(tarifa.base_para("NHR"), None);
    }
}
