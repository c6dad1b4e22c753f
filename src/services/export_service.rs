//! Exportación a la plantilla de facturación
//!
//! Genera la plantilla que consume el sistema externo de facturación:
//! una fila por pedido AUTHORIZED, ordenada por consecutivo de vehículo y
//! de integra. Los documentos de transporte se concatenan en la primera
//! fila de cada integra y los totales del despacho van solo en la primera
//! fila de cada vehículo; el consumidor arrastra los valores.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

use crate::cache::TarifaCache;
use crate::models::export::{ExportRow, ExportSheet, EXPORT_SHEET_NAME};
use crate::models::pedido::Pedido;
use crate::repositories::pedido_repository::BundleStore;
use crate::utils::errors::EngineResult;

/// Cliente con tratamiento de facturación especial: seguro fijo y
/// observación con prefijo DN
const NIT_CLIENTE_DN: &str = "900402080";

const SEGURO_FIJO_DN: Decimal = Decimal::from_parts(6_000, 0, 0, false, 0);

/// Valor facturable de cada punto de entrega adicional
const VALOR_PUNTO_FACTURACION: Decimal = Decimal::from_parts(70_000, 0, 0, false, 0);

/// Servicio de exportación
pub struct ExportService {
    store: Arc<dyn BundleStore>,
    tarifas: Arc<TarifaCache>,
}

impl ExportService {
    pub fn new(store: Arc<dyn BundleStore>, tarifas: Arc<TarifaCache>) -> Self {
        Self { store, tarifas }
    }

    /// Plantilla de facturación con todas las líneas autorizadas
    pub async fn export(&self) -> EngineResult<ExportSheet> {
        let mut lines = self.store.authorized_lines().await?;
        lines.sort_by(|a, b| {
            a.vehicle_consecutive
                .cmp(&b.vehicle_consecutive)
                .then_with(|| a.integra_consecutive.cmp(&b.integra_consecutive))
        });

        // Documentos de transporte por integra, únicos y en orden de aparición
        let mut documentos: HashMap<String, Vec<String>> = HashMap::new();
        for line in &lines {
            let docs = documentos
                .entry(line.integra_consecutive.clone())
                .or_default();
            let doc = line.tracking_document.trim().to_string();
            if !doc.is_empty() && !docs.contains(&doc) {
                docs.push(doc);
            }
        }

        // Suma de cargue/descargue KABI y marca DN por despacho
        let mut kabi_por_vehiculo: HashMap<&str, Decimal> = HashMap::new();
        let mut seguro_por_vehiculo: HashMap<&str, Decimal> = HashMap::new();
        let mut dn_por_vehiculo: HashSet<&str> = HashSet::new();
        for line in &lines {
            *kabi_por_vehiculo
                .entry(line.vehicle_consecutive.as_str())
                .or_insert(Decimal::ZERO) += line.load_unload_kabi;
            *seguro_por_vehiculo
                .entry(line.vehicle_consecutive.as_str())
                .or_insert(Decimal::ZERO) += line.insurance;
            if line.client_nit == NIT_CLIENTE_DN {
                dn_por_vehiculo.insert(line.vehicle_consecutive.as_str());
            }
        }

        let mut rows = Vec::with_capacity(lines.len());
        let mut integras_vistas: HashSet<String> = HashSet::new();
        let mut vehiculos_vistos: HashSet<String> = HashSet::new();

        for line in &lines {
            let primera_de_integra = integras_vistas.insert(line.integra_consecutive.clone());
            let primera_de_vehiculo = vehiculos_vistos.insert(line.vehicle_consecutive.clone());

            let concat = documentos
                .get(&line.integra_consecutive)
                .map(|docs| docs.join(", "))
                .unwrap_or_default();

            let tracking_documents = if primera_de_integra {
                concat.clone()
            } else {
                String::new()
            };

            let (tonnes, unit_freight, extra_point, load_unload, detour, insurance, unit_value) =
                if primera_de_vehiculo {
                    totales_de_vehiculo(
                        line,
                        kabi_por_vehiculo
                            .get(line.vehicle_consecutive.as_str())
                            .copied()
                            .unwrap_or(Decimal::ZERO),
                        seguro_por_vehiculo
                            .get(line.vehicle_consecutive.as_str())
                            .copied()
                            .unwrap_or(Decimal::ZERO),
                        dn_por_vehiculo.contains(line.vehicle_consecutive.as_str()),
                    )
                } else {
                    (
                        Decimal::ZERO,
                        Decimal::ZERO,
                        Decimal::ZERO,
                        Decimal::ZERO,
                        Decimal::ZERO,
                        Decimal::ZERO,
                        Decimal::ZERO,
                    )
                };

            let tarifa = self.tarifas.tariff(&line.origin, &line.destination).await?;

            let observation = if line.client_nit == NIT_CLIENTE_DN {
                format!("DN {}", concat)
            } else {
                line.observations.to_uppercase()
            };

            rows.push(ExportRow {
                vehicle_consecutive: line.vehicle_consecutive.clone(),
                integra_consecutive: line.integra_consecutive.clone(),
                client_nit: line.client_nit.clone(),
                origin: line.origin.clone(),
                destination: line.destination.clone(),
                real_destination: line.real_destination.clone(),
                vehicle_plate: line.vehicle_plate.clone(),
                vehicle_type: line.billing_vehicle_type().to_string(),
                tracking_documents,
                cajas: line.cajas,
                kilos: line.kilos,
                tonnes,
                unit_freight,
                extra_point,
                load_unload_per_juridica: load_unload,
                detour,
                insurance,
                unit_value,
                cost_center: tarifa.equivalencia_centro_costo.clone(),
                observation,
            });
        }

        info!(filas = rows.len(), "plantilla de facturación generada");
        Ok(ExportSheet {
            sheet_name: EXPORT_SHEET_NAME,
            rows,
        })
    }
}

/// Totales de despacho que van en la primera fila de cada vehículo
fn totales_de_vehiculo(
    line: &Pedido,
    kabi: Decimal,
    seguro_lineas: Decimal,
    es_dn: bool,
) -> (Decimal, Decimal, Decimal, Decimal, Decimal, Decimal, Decimal) {
    let tonnes = (line.total_kilos_vehicle_sicetac / Decimal::from(1000)).round_dp(3);

    // El flete unitario usa el cargue/descargue del despacho tal cual,
    // no el máximo contra KABI
    let unit_freight = line.total_requested_freight
        + line.total_detour_vehicle
        + line.total_extra_point
        + line.total_load_unload;

    let puntos_extra = Decimal::from(line.total_points_vehicle.saturating_sub(1));
    let extra_point = line
        .total_extra_point
        .max(VALOR_PUNTO_FACTURACION * puntos_extra);

    let load_unload = line.total_load_unload.max(kabi);

    let insurance = if es_dn { SEGURO_FIJO_DN } else { seguro_lineas };

    let siete_decimas = Decimal::new(7, 1);
    let cincuenta = Decimal::from(50);
    let unit_value = (line.total_requested_freight / siete_decimas / cincuenta).ceil() * cincuenta;

    (
        tonnes,
        unit_freight,
        extra_point,
        load_unload,
        line.total_detour_vehicle,
        insurance,
        unit_value,
    )
}
