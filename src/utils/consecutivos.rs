//! Construcción de consecutivos
//!
//! Los identificadores del motor son compuestos:
//! `consecutivo integra = REGION-YYYYMMDD-PEDIDO` y
//! `consecutivo vehículo = REGION-YYYYMMDD-PLACA`. Las divisiones de un
//! vehículo agregan el sufijo `B` o `C` sin separador.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::utils::errors::{validation_error, EngineResult};

lazy_static! {
    /// Placa colombiana: tres letras y tres dígitos, se admite guión
    static ref PLACA_RE: Regex = Regex::new(r"^[A-Z]{3}-?\d{3}$").unwrap();
}

/// Segmento de fecha `YYYYMMDD` de un lote
pub fn segmento_fecha(fecha: DateTime<Utc>) -> String {
    fecha.format("%Y%m%d").to_string()
}

/// `REGION-YYYYMMDD-PEDIDO`
pub fn consecutivo_integra(region: &str, fecha: DateTime<Utc>, pedido: &str) -> String {
    format!("{}-{}-{}", region, segmento_fecha(fecha), pedido)
}

/// `REGION-YYYYMMDD-PLACA`
pub fn consecutivo_vehiculo(region: &str, fecha: DateTime<Utc>, placa: &str) -> String {
    format!(
        "{}-{}-{}",
        region,
        segmento_fecha(fecha),
        placa.replace('-', "")
    )
}

/// Sufijo determinístico de un grupo de división (`B` o `C`, sin separador)
pub fn con_sufijo(id: &str, sufijo: char) -> String {
    format!("{}{}", id, sufijo)
}

/// Valida el formato de una placa de vehículo
pub fn validar_placa(placa: &str) -> EngineResult<()> {
    if PLACA_RE.is_match(&placa.trim().to_uppercase()) {
        Ok(())
    } else {
        Err(validation_error(format!(
            "La placa '{}' no tiene un formato válido",
            placa
        )))
    }
}
