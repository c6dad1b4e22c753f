//! Política de acceso
//!
//! Matriz de capacidades por rol y regla de regionales. La tabla es un
//! dato, no código con ramas, para que auditar o cambiar un permiso toque
//! una sola línea. Las regionales CELTA y FUNZA operan como una sola área.

use serde::{Deserialize, Serialize};

use crate::models::auth::{UserInfo, UserRole};
use crate::utils::errors::{EngineError, EngineResult};

/// Capacidades que declaran las operaciones del motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    IngestBatch,
    AdjustBundle,
    MergeSplit,
    AuthorizeCoordinator,
    AuthorizeControl,
    ConfirmPreauthorized,
    DeleteBundle,
    ViewAllRegions,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::IngestBatch => "ingest_batch",
            Capability::AdjustBundle => "adjust_bundle",
            Capability::MergeSplit => "merge_split",
            Capability::AuthorizeCoordinator => "authorize_requires_coordinator",
            Capability::AuthorizeControl => "authorize_requires_control",
            Capability::ConfirmPreauthorized => "confirm_preauthorized",
            Capability::DeleteBundle => "delete_bundle",
            Capability::ViewAllRegions => "view_all_regions",
        }
    }
}

use Capability::*;
use UserRole::*;

/// Matriz de capacidades: qué roles pueden qué operación
const CAPABILITY_MATRIX: &[(Capability, &[UserRole])] = &[
    (IngestBatch, &[Admin, Dispatcher, Operator, Analyst]),
    (AdjustBundle, &[Admin, Dispatcher, Analyst, Operator]),
    (MergeSplit, &[Admin, Dispatcher, Operator]),
    (AuthorizeCoordinator, &[Admin, Coordinator, Control]),
    (AuthorizeControl, &[Admin, Control]),
    (ConfirmPreauthorized, &[Admin, Dispatcher, Analyst, Operator]),
    (DeleteBundle, &[Admin, Analyst, Dispatcher, Operator]),
    (ViewAllRegions, &[Admin, Coordinator, Control, Analyst]),
];

/// Regionales emparejadas: operan como una sola área
const PAIRED_REGIONS: (&str, &str) = ("CELTA", "FUNZA");

/// Verifica si un rol tiene una capacidad
pub fn role_has_capability(role: UserRole, capability: Capability) -> bool {
    CAPABILITY_MATRIX
        .iter()
        .find(|(cap, _)| *cap == capability)
        .map_or(false, |(_, roles)| roles.contains(&role))
}

/// Verifica si un usuario puede operar sobre la regional de un despacho.
/// DISPATCHER y OPERATOR solo operan su propia regional, con la excepción
/// del par CELTA-FUNZA; los demás roles no tienen restricción regional.
pub fn region_allows(user: &UserInfo, bundle_region: &str) -> bool {
    match user.role {
        Dispatcher | Operator => {
            let propia = user.region.to_uppercase();
            let objetivo = bundle_region.to_uppercase();
            if propia == objetivo {
                return true;
            }
            let (a, b) = PAIRED_REGIONS;
            (propia == a && objetivo == b) || (propia == b && objetivo == a)
        }
        _ => true,
    }
}

/// Verifica rol y regional para una operación; falla con el error
/// estructurado correspondiente
pub fn check(user: &UserInfo, capability: Capability, bundle_region: &str) -> EngineResult<()> {
    if !role_has_capability(user.role, capability) {
        return Err(EngineError::NoAutorizado {
            usuario: user.username.clone(),
            rol: user.role.as_str().to_string(),
            operacion: capability.as_str().to_string(),
        });
    }
    if !region_allows(user, bundle_region) {
        return Err(EngineError::RegionNoPermitida {
            usuario: user.username.clone(),
            region_usuario: user.region.clone(),
            region_vehiculo: bundle_region.to_string(),
        });
    }
    Ok(())
}

/// Capacidad requerida para autorizar un despacho según su estado actual
pub fn authorize_capability_for(state: crate::models::pedido::EstadoPedido) -> Option<Capability> {
    use crate::models::pedido::EstadoPedido;
    match state {
        EstadoPedido::RequiresCoordinator => Some(AuthorizeCoordinator),
        EstadoPedido::RequiresControl => Some(AuthorizeControl),
        _ => None,
    }
}
