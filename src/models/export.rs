//! Filas de exportación
//!
//! Formato tabular que consume el sistema externo de facturación: una fila
//! por pedido autorizado, con los totales de cada despacho escritos solo en
//! la primera fila del despacho (el consumidor arrastra los valores).

use rust_decimal::Decimal;
use serde::Serialize;

/// Nombre fijo de la hoja que espera el consumidor
pub const EXPORT_SHEET_NAME: &str = "plantilla";

/// Fila de la plantilla de facturación
#[derive(Debug, Clone, Serialize)]
pub struct ExportRow {
    #[serde(rename = "CONSECUTIVO_VEHICULO")]
    pub vehicle_consecutive: String,

    #[serde(rename = "CONSECUTIVO_INTEGRA")]
    pub integra_consecutive: String,

    #[serde(rename = "NIT_CLIENTE")]
    pub client_nit: String,

    #[serde(rename = "ORIGEN")]
    pub origin: String,

    #[serde(rename = "DESTINO")]
    pub destination: String,

    #[serde(rename = "DESTINO_REAL")]
    pub real_destination: String,

    #[serde(rename = "PLACA")]
    pub vehicle_plate: String,

    #[serde(rename = "TIPO_VEHICULO")]
    pub vehicle_type: String,

    /// Documentos de transporte del consecutivo integra, concatenados y
    /// solo en la primera fila de cada integra
    #[serde(rename = "DOCUMENTOS_TRANSPORTE")]
    pub tracking_documents: String,

    #[serde(rename = "CAJAS")]
    pub cajas: i64,

    #[serde(rename = "KILOS")]
    pub kilos: Decimal,

    /// Toneladas SICETAC del despacho, 3 decimales, solo primera fila
    #[serde(rename = "TONELADAS")]
    pub tonnes: Decimal,

    /// Flete unitario del despacho, solo primera fila
    #[serde(rename = "FLETE_UNITARIO")]
    pub unit_freight: Decimal,

    #[serde(rename = "PUNTO_ADICIONAL")]
    pub extra_point: Decimal,

    #[serde(rename = "CARGUE_DESCARGUE_JURIDICA")]
    pub load_unload_per_juridica: Decimal,

    #[serde(rename = "DESVIO")]
    pub detour: Decimal,

    #[serde(rename = "SEGURO")]
    pub insurance: Decimal,

    /// Valor unitario facturable, redondeado hacia arriba al múltiplo de 50
    #[serde(rename = "VALOR_UNITARIO")]
    pub unit_value: Decimal,

    #[serde(rename = "CENTRO_COSTO")]
    pub cost_center: String,

    #[serde(rename = "OBSERVACIONES")]
    pub observation: String,
}

/// Plantilla de exportación completa
#[derive(Debug, Clone, Serialize)]
pub struct ExportSheet {
    pub sheet_name: &'static str,
    pub rows: Vec<ExportRow>,
}
