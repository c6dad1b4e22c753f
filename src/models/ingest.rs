//! Filas de ingesta
//!
//! Este módulo contiene la fila normalizada que entrega el cargador de
//! hojas de cálculo (colaborador externo) y el resultado de un lote. El
//! motor recibe las filas ya normalizadas; los valores numéricos llegan
//! como texto y se validan aquí campo por campo.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Fila normalizada de la hoja de despachos, una por pedido
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct IngestRow {
    #[serde(rename = "NIT_CLIENT")]
    #[validate(length(min = 1, max = 20))]
    pub nit_client: String,

    #[serde(rename = "ORIGIN")]
    pub origin: String,

    #[serde(rename = "DESTINATION")]
    pub destination: String,

    #[serde(rename = "REAL_DESTINATION")]
    pub real_destination: String,

    #[serde(rename = "NUM_CAJAS")]
    pub num_cajas: String,

    #[serde(rename = "NUM_KILOS")]
    pub num_kilos: String,

    /// Opcional: si está vacío, se usan los kilos físicos
    #[serde(rename = "NUM_KILOS_SICETAC", default)]
    pub num_kilos_sicetac: String,

    #[serde(rename = "VEHICLE_TYPE")]
    pub vehicle_type: String,

    /// Opcional: tipo con el que se tarifa, si difiere del digitado
    #[serde(rename = "VEHICLE_TYPE_SICETAC", default)]
    pub vehicle_type_sicetac: String,

    #[serde(rename = "VEHICLE_PLATE")]
    #[validate(length(min = 5, max = 10))]
    pub vehicle_plate: String,

    #[serde(rename = "DECLARED_VALUE")]
    pub declared_value: String,

    #[serde(rename = "TRACKING_DOCUMENT")]
    pub tracking_document: String,

    #[serde(rename = "REQUESTED_FREIGHT")]
    pub requested_freight: String,

    #[serde(rename = "LOAD_LOCATION")]
    pub load_location: String,

    #[serde(rename = "LOAD_ADDRESS")]
    pub load_address: String,

    #[serde(rename = "UNLOAD_LOCATION")]
    pub unload_location: String,

    #[serde(rename = "UNLOAD_ADDRESS")]
    pub unload_address: String,

    #[serde(rename = "OBSERVATIONS", default)]
    pub observations: String,

    #[serde(rename = "TRIP_TYPE")]
    pub trip_type: String,

    #[serde(rename = "ORDER_CONSECUTIVE")]
    pub order_consecutive: String,

    #[serde(rename = "DETOUR", default)]
    pub detour: String,

    #[serde(rename = "LOAD_UNLOAD", default)]
    pub load_unload: String,

    #[serde(rename = "LOAD_UNLOAD_KABI", default)]
    pub load_unload_kabi: String,

    #[serde(rename = "EXTRA_POINT", default)]
    pub extra_point: String,

    #[serde(rename = "TOTAL_POINTS", default)]
    pub total_points: String,

    #[serde(rename = "INSURANCE", default)]
    pub insurance: String,

    #[serde(rename = "REAL_FREIGHT", default)]
    pub real_freight: String,
}

/// Resultado de un lote aceptado
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Pedidos insertados
    pub line_count: usize,
    /// Despachos (vehículos) creados
    pub bundle_count: usize,
    /// Consecutivos de vehículo creados, en orden de aparición
    pub vehicle_consecutives: Vec<String>,
    /// Despachos preautorizados por el sistema
    pub preauthorized: usize,
}
