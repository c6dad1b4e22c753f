//! Modelo de Pedido
//!
//! Un pedido es la entidad más fina del motor: una tupla
//! remitente-destino-carga dentro de un despacho de vehículo. Todos los
//! pedidos que comparten `vehicle_consecutive` forman un despacho, y los
//! campos de alcance de vehículo se espejan en cada pedido para que una
//! consulta sobre cualquier línea revele los totales del despacho.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado de autorización de un despacho
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoPedido {
    Preauthorized,
    RequiresCoordinator,
    RequiresControl,
    Authorized,
    Completed,
}

impl EstadoPedido {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoPedido::Preauthorized => "PREAUTHORIZED",
            EstadoPedido::RequiresCoordinator => "REQUIRES_COORDINATOR",
            EstadoPedido::RequiresControl => "REQUIRES_CONTROL",
            EstadoPedido::Authorized => "AUTHORIZED",
            EstadoPedido::Completed => "COMPLETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PREAUTHORIZED" => Some(EstadoPedido::Preauthorized),
            "REQUIRES_COORDINATOR" => Some(EstadoPedido::RequiresCoordinator),
            "REQUIRES_CONTROL" => Some(EstadoPedido::RequiresControl),
            "AUTHORIZED" => Some(EstadoPedido::Authorized),
            "COMPLETED" => Some(EstadoPedido::Completed),
            _ => None,
        }
    }

    /// Estados previos a la autorización, donde aplican ajustes,
    /// fusiones y divisiones
    pub fn is_pre_authorization(&self) -> bool {
        matches!(
            self,
            EstadoPedido::Preauthorized
                | EstadoPedido::RequiresCoordinator
                | EstadoPedido::RequiresControl
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EstadoPedido::Completed)
    }
}

/// Tipo de viaje de la línea
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoViaje {
    Bulk,
    Parcel,
}

impl TipoViaje {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoViaje::Bulk => "BULK",
            TipoViaje::Parcel => "PARCEL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BULK" => Some(TipoViaje::Bulk),
            "PARCEL" => Some(TipoViaje::Parcel),
            _ => None,
        }
    }
}

/// Pedido: una línea de despacho dentro de un vehículo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pedido {
    // Identidad
    pub id: Uuid,
    pub order_consecutive: String,
    /// `REGION-YYYYMMDD-PEDIDO`; único por vehículo
    pub integra_consecutive: String,
    /// `REGION-YYYYMMDD-PLACA`; identifica el despacho
    pub vehicle_consecutive: String,
    /// Número asignado por el sistema externo de facturación
    pub pedido_number: Option<String>,

    // Remitente y destinatario
    pub client_nit: String,
    pub origin: String,
    pub destination: String,
    pub real_destination: String,
    pub load_location: String,
    pub load_address: String,
    pub unload_location: String,
    pub unload_address: String,
    pub observations: String,
    pub tracking_document: String,

    // Carga
    pub cajas: i64,
    pub kilos: Decimal,
    /// Kilos para clasificación tarifaria; por defecto iguales a `kilos`
    pub kilos_sicetac: Decimal,
    pub declared_value: Decimal,
    pub insurance: Decimal,

    // Vehículo
    pub vehicle_plate: String,
    pub vehicle_type: String,
    /// Tipo para clasificación tarifaria; puede diferir del digitado
    pub vehicle_type_sicetac: Option<String>,
    pub trip_type: TipoViaje,

    // Dinero por línea
    pub requested_freight: Decimal,
    pub real_freight: Decimal,
    pub detour: Decimal,
    pub load_unload: Decimal,
    pub load_unload_kabi: Decimal,
    pub extra_point: Decimal,
    pub total_points: Decimal,

    // Espejos de alcance de vehículo (mismo valor en todas las líneas)
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

    // Estado
    pub state: EstadoPedido,
    /// `"SYSTEM"` cuando preautoriza el motor, `"NA"` mientras nadie autoriza
    pub authorized_by: String,
    pub authorization_ts: String,
    pub approver_observations: String,
    pub adjustment_observations: String,
    pub region: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,

    // Rastro de auditoría, embebido en la línea
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usuario_ajusta_destino: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_ajusta_destino: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usuario_fusion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_fusion: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observacion_fusion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usuario_division: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_division: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observacion_division: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pedido_actualizado_vulcano_por: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_actualizacion_vulcano: Option<DateTime<Utc>>,
}

impl Pedido {
    /// Tipo de vehículo con que se tarifa la línea:
    /// el SICETAC si existe, si no el digitado
    pub fn billing_vehicle_type(&self) -> &str {
        self.vehicle_type_sicetac
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.vehicle_type)
    }
}

/// Valor centinela para campos de autorización sin diligenciar
pub const NA: &str = "NA";

/// Autor de las preautorizaciones automáticas
pub const SYSTEM_USER: &str = "SYSTEM";

#[cfg(test)]
pub fn pedido_de_prueba(
    vehicle_consecutive: &str,
    integra_consecutive: &str,
    real_destination: &str,
    kilos: i64,
    requested_freight: i64,
) -> Pedido {
    Pedido {
        id: Uuid::new_v4(),
        order_consecutive: "10001".into(),
        integra_consecutive: integra_consecutive.into(),
        vehicle_consecutive: vehicle_consecutive.into(),
        pedido_number: None,
        client_nit: "800100200".into(),
        origin: "CALI".into(),
        destination: "BOGOTA".into(),
        real_destination: real_destination.into(),
        load_location: "CALI".into(),
        load_address: "CL 1 # 2-3".into(),
        unload_location: "BOGOTA".into(),
        unload_address: "CR 4 # 5-6".into(),
        observations: "entrega en porteria".into(),
        tracking_document: "RM-1".into(),
        cajas: 10,
        kilos: Decimal::from(kilos),
        kilos_sicetac: Decimal::from(kilos),
        declared_value: Decimal::from(1_000_000),
        insurance: Decimal::ZERO,
        vehicle_plate: "ABC123".into(),
        vehicle_type: "TURBO".into(),
        vehicle_type_sicetac: None,
        trip_type: TipoViaje::Bulk,
        requested_freight: Decimal::from(requested_freight),
        real_freight: Decimal::from(requested_freight),
        detour: Decimal::ZERO,
        load_unload: Decimal::ZERO,
        load_unload_kabi: Decimal::ZERO,
        extra_point: Decimal::ZERO,
        total_points: Decimal::ZERO,
        total_cajas_vehicle: 0,
        total_kilos_vehicle: Decimal::ZERO,
        total_kilos_vehicle_sicetac: Decimal::ZERO,
        total_points_vehicle: 0,
        system_freight: Decimal::ZERO,
        theoretical_extra_point: Decimal::ZERO,
        theoretical_load_unload: Decimal::ZERO,
        theoretical_cost_vehicle: Decimal::ZERO,
        total_requested_freight: Decimal::ZERO,
        total_load_unload: Decimal::ZERO,
        total_extra_point: Decimal::ZERO,
        total_detour_vehicle: Decimal::ZERO,
        total_vehicle_freight: Decimal::ZERO,
        freight_difference: Decimal::ZERO,
        percent_over_theoretical: Decimal::ZERO,
        state: EstadoPedido::Preauthorized,
        authorized_by: NA.into(),
        authorization_ts: NA.into(),
        approver_observations: String::new(),
        adjustment_observations: String::new(),
        region: "FUNZA".into(),
        created_by: "maria".into(),
        created_at: Utc::now(),
        usuario_ajusta_destino: None,
        fecha_ajusta_destino: None,
        usuario_fusion: None,
        fecha_fusion: None,
        observacion_fusion: None,
        usuario_division: None,
        fecha_division: None,
        observacion_division: None,
        pedido_actualizado_vulcano_por: None,
        fecha_actualizacion_vulcano: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estado_round_trip() {
        for estado in [
            EstadoPedido::Preauthorized,
            EstadoPedido::RequiresCoordinator,
            EstadoPedido::RequiresControl,
            EstadoPedido::Authorized,
            EstadoPedido::Completed,
        ] {
            assert_eq!(EstadoPedido::from_str(estado.as_str()), Some(estado));
        }
    }

    #[test]
    fn test_estados_previos_a_autorizacion() {
        assert!(EstadoPedido::Preauthorized.is_pre_authorization());
        assert!(EstadoPedido::RequiresControl.is_pre_authorization());
        assert!(!EstadoPedido::Authorized.is_pre_authorization());
        assert!(EstadoPedido::Completed.is_terminal());
    }

    #[test]
    fn test_billing_vehicle_type() {
        let mut pedido = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        assert_eq!(pedido.billing_vehicle_type(), "TURBO");
        pedido.vehicle_type_sicetac = Some("NIES".into());
        assert_eq!(pedido.billing_vehicle_type(), "NIES");
        pedido.vehicle_type_sicetac = Some("  ".into());
        assert_eq!(pedido.billing_vehicle_type(), "TURBO");
    }
}
