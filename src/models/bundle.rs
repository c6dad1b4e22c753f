//! Vista de despacho (vehículo)
//!
//! Un despacho no se persiste como documento propio: se reconstruye
//! agrupando los pedidos por `vehicle_consecutive`. Este módulo define los
//! espejos de alcance de vehículo, la actualización multi-campo que se
//! escribe en una sola pasada sobre todas las líneas y el resumen que
//! consume el listado.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::pedido::{EstadoPedido, Pedido};
use crate::utils::city::city_key;

/// Campos de alcance de vehículo, espejados en cada línea del despacho
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMirrors {
    pub total_cajas_vehicle: i64,
    pub total_kilos_vehicle: Decimal,
    pub total_kilos_vehicle_sicetac: Decimal,
    pub total_points_vehicle: u32,
    pub system_freight: Decimal,
    pub theoretical_extra_point: Decimal,
    pub theoretical_load_unload: Decimal,
    pub theoretical_cost_vehicle: Decimal,
    pub total_requested_freight: Decimal,
    pub total_load_unload: Decimal,
    pub total_extra_point: Decimal,
    pub total_detour_vehicle: Decimal,
    pub total_vehicle_freight: Decimal,
    pub freight_difference: Decimal,
    pub percent_over_theoretical: Decimal,
}

impl BundleMirrors {
    /// Copia los espejos sobre una línea
    pub fn apply(&self, pedido: &mut Pedido) {
        pedido.total_cajas_vehicle = self.total_cajas_vehicle;
        pedido.total_kilos_vehicle = self.total_kilos_vehicle;
        pedido.total_kilos_vehicle_sicetac = self.total_kilos_vehicle_sicetac;
        pedido.total_points_vehicle = self.total_points_vehicle;
        pedido.system_freight = self.system_freight;
        pedido.theoretical_extra_point = self.theoretical_extra_point;
        pedido.theoretical_load_unload = self.theoretical_load_unload;
        pedido.theoretical_cost_vehicle = self.theoretical_cost_vehicle;
        pedido.total_requested_freight = self.total_requested_freight;
        pedido.total_load_unload = self.total_load_unload;
        pedido.total_extra_point = self.total_extra_point;
        pedido.total_detour_vehicle = self.total_detour_vehicle;
        pedido.total_vehicle_freight = self.total_vehicle_freight;
        pedido.freight_difference = self.freight_difference;
        pedido.percent_over_theoretical = self.percent_over_theoretical;
    }
}

/// Campos del rastro de auditoría que una operación deja en las líneas
#[derive(Debug, Clone, Default)]
pub struct AuditUpdate {
    pub usuario_ajusta_destino: Option<String>,
    pub fecha_ajusta_destino: Option<DateTime<Utc>>,
    pub usuario_fusion: Option<String>,
    pub fecha_fusion: Option<DateTime<Utc>>,
    pub observacion_fusion: Option<String>,
    pub usuario_division: Option<String>,
    pub fecha_division: Option<DateTime<Utc>>,
    pub observacion_division: Option<String>,
    pub pedido_actualizado_vulcano_por: Option<String>,
    pub fecha_actualizacion_vulcano: Option<DateTime<Utc>>,
}

/// Actualización atómica sobre todas las líneas de un despacho.
/// Solo los campos presentes se escriben; se aplica como una sola
/// actualización multi-campo para que ninguna lectura vea espejos a medias.
#[derive(Debug, Clone, Default)]
pub struct BundleUpdate {
    pub state: Option<EstadoPedido>,
    pub mirrors: Option<BundleMirrors>,
    pub destination: Option<String>,
    pub vehicle_type_sicetac: Option<String>,
    pub integra_consecutive: Option<String>,
    pub authorized_by: Option<String>,
    pub authorization_ts: Option<String>,
    pub approver_observations: Option<String>,
    pub adjustment_observations: Option<String>,
    pub audit: AuditUpdate,
}

impl BundleUpdate {
    /// Aplica la actualización sobre una línea
    pub fn apply(&self, pedido: &mut Pedido) {
        if let Some(state) = self.state {
            pedido.state = state;
        }
        if let Some(mirrors) = &self.mirrors {
            mirrors.apply(pedido);
        }
        if let Some(destination) = &self.destination {
            pedido.destination = destination.clone();
        }
        if let Some(tipo) = &self.vehicle_type_sicetac {
            pedido.vehicle_type_sicetac = Some(tipo.clone());
        }
        if let Some(integra) = &self.integra_consecutive {
            pedido.integra_consecutive = integra.clone();
        }
        if let Some(authorized_by) = &self.authorized_by {
            pedido.authorized_by = authorized_by.clone();
        }
        if let Some(ts) = &self.authorization_ts {
            pedido.authorization_ts = ts.clone();
        }
        if let Some(obs) = &self.approver_observations {
            pedido.approver_observations = obs.clone();
        }
        if let Some(obs) = &self.adjustment_observations {
            pedido.adjustment_observations = obs.clone();
        }

        let audit = &self.audit;
        if audit.usuario_ajusta_destino.is_some() {
            pedido.usuario_ajusta_destino = audit.usuario_ajusta_destino.clone();
            pedido.fecha_ajusta_destino = audit.fecha_ajusta_destino;
        }
        if audit.usuario_fusion.is_some() {
            pedido.usuario_fusion = audit.usuario_fusion.clone();
            pedido.fecha_fusion = audit.fecha_fusion;
            pedido.observacion_fusion = audit.observacion_fusion.clone();
        }
        if audit.usuario_division.is_some() {
            pedido.usuario_division = audit.usuario_division.clone();
            pedido.fecha_division = audit.fecha_division;
            pedido.observacion_division = audit.observacion_division.clone();
        }
        if audit.pedido_actualizado_vulcano_por.is_some() {
            pedido.pedido_actualizado_vulcano_por =
                audit.pedido_actualizado_vulcano_por.clone();
            pedido.fecha_actualizacion_vulcano = audit.fecha_actualizacion_vulcano;
        }
    }
}

/// Resumen de un despacho para el listado de operadores
#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub vehicle_consecutive: String,
    pub region: String,
    pub origin: String,
    pub destination: String,
    /// Estado del despacho, o `MULTIESTADO` si las líneas difieren
    pub state: String,
    pub multistate: bool,
    pub line_count: usize,
    pub total_cajas_vehicle: i64,
    pub total_kilos_vehicle: Decimal,
    pub total_vehicle_freight: Decimal,
    pub theoretical_cost_vehicle: Decimal,
    pub percent_over_theoretical: Decimal,
    pub real_destinations: Vec<String>,
    pub lines: Vec<Pedido>,
}

impl BundleSummary {
    pub fn from_lines(mut lines: Vec<Pedido>) -> Option<Self> {
        if lines.is_empty() {
            return None;
        }
        lines.sort_by(|a, b| a.integra_consecutive.cmp(&b.integra_consecutive));

        let multistate = lines.iter().any(|l| l.state != lines[0].state);
        let state = if multistate {
            "MULTIESTADO".to_string()
        } else {
            lines[0].state.as_str().to_string()
        };

        let mut real_destinations = Vec::new();
        for line in &lines {
            let key = city_key(&line.real_destination);
            if !key.is_empty() && !real_destinations.contains(&key) {
                real_destinations.push(key);
            }
        }

        let first = &lines[0];
        Some(Self {
            vehicle_consecutive: first.vehicle_consecutive.clone(),
            region: first.region.clone(),
            origin: first.origin.clone(),
            destination: first.destination.clone(),
            state,
            multistate,
            line_count: lines.len(),
            total_cajas_vehicle: first.total_cajas_vehicle,
            total_kilos_vehicle: first.total_kilos_vehicle,
            total_vehicle_freight: first.total_vehicle_freight,
            theoretical_cost_vehicle: first.theoretical_cost_vehicle,
            percent_over_theoretical: first.percent_over_theoretical,
            real_destinations,
            lines,
        })
    }
}

/// Agrupa pedidos sueltos en resúmenes de despacho, ordenados por
/// consecutivo de vehículo
pub fn group_bundles(lines: Vec<Pedido>) -> Vec<BundleSummary> {
    let mut by_vehicle: BTreeMap<String, Vec<Pedido>> = BTreeMap::new();
    for line in lines {
        by_vehicle
            .entry(line.vehicle_consecutive.clone())
            .or_default()
            .push(line);
    }
    by_vehicle
        .into_values()
        .filter_map(BundleSummary::from_lines)
        .collect()
}
