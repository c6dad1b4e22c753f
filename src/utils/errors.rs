//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del motor de despachos
//! y su conversión a payloads estructurados para la capa de transporte.

use serde_json::json;
use thiserror::Error;

/// Error de una fila individual dentro de un lote de ingesta
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorFila {
    /// Número de fila en la hoja (la fila 1 es el encabezado)
    pub fila: usize,
    /// Campo que causó el error, si aplica
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campo: Option<String>,
    /// Mensaje en español para el operador
    pub mensaje: String,
}

impl ErrorFila {
    pub fn new(fila: usize, campo: Option<&str>, mensaje: impl Into<String>) -> Self {
        Self {
            fila,
            campo: campo.map(|c| c.to_string()),
            mensaje: mensaje.into(),
        }
    }
}

/// Errores principales del motor de autorización de despachos
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Error de validación: {0}")]
    Validacion(String),

    #[error("Lote rechazado: {} fila(s) con errores", .0.len())]
    LoteInvalido(Vec<ErrorFila>),

    #[error("No existe tarifa para {origen} -> {destino}")]
    TarifaNoEncontrada { origen: String, destino: String },

    #[error("No existe tarifa de {origen} -> {destino} para el tipo de vehículo {tipo_vehiculo}")]
    TarifaSinTipoVehiculo {
        origen: String,
        destino: String,
        tipo_vehiculo: String,
    },

    #[error("No existen otros costos para el tipo de vehículo {0}")]
    OtrosCostosNoEncontrados(String),

    #[error("Cliente con NIT {0} no existe")]
    ClienteNoEncontrado(String),

    #[error("Usuario {0} no encontrado")]
    UsuarioNoEncontrado(String),

    #[error("El usuario {usuario} con rol {rol} no puede ejecutar la operación {operacion}")]
    NoAutorizado {
        usuario: String,
        rol: String,
        operacion: String,
    },

    #[error("El usuario {usuario} de la regional {region_usuario} no puede operar vehículos de la regional {region_vehiculo}")]
    RegionNoPermitida {
        usuario: String,
        region_usuario: String,
        region_vehiculo: String,
    },

    #[error("Vehículo {0} no encontrado")]
    VehiculoNoEncontrado(String),

    #[error("Pedido {0} no encontrado")]
    PedidoNoEncontrado(String),

    #[error("Operación {operacion} inválida para el vehículo {vehiculo} en estado {estado}")]
    EstadoInvalido {
        vehiculo: String,
        estado: String,
        operacion: String,
    },

    #[error("El tiempo límite de la solicitud se agotó")]
    TiempoAgotado,

    #[error("Error del almacén de datos: {0}")]
    Almacen(String),

    #[error("Servicio externo no disponible: {0}")]
    ServicioNoDisponible(String),

    #[error("Error interno: {0}")]
    Interno(String),
}

impl EngineError {
    /// Código estable por tipo de error, para consumo de máquinas
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validacion(_) => "VALIDATION",
            EngineError::LoteInvalido(_) => "BATCH_REJECTED",
            EngineError::TarifaNoEncontrada { .. } => "TARIFF_MISSING",
            EngineError::TarifaSinTipoVehiculo { .. } => "TARIFF_MISSING",
            EngineError::OtrosCostosNoEncontrados(_) => "OTHER_COSTS_MISSING",
            EngineError::ClienteNoEncontrado(_) => "CLIENT_UNKNOWN",
            EngineError::UsuarioNoEncontrado(_) => "USER_UNKNOWN",
            EngineError::NoAutorizado { .. } => "FORBIDDEN_ROLE",
            EngineError::RegionNoPermitida { .. } => "FORBIDDEN_REGION",
            EngineError::VehiculoNoEncontrado(_) => "BUNDLE_NOT_FOUND",
            EngineError::PedidoNoEncontrado(_) => "LINE_NOT_FOUND",
            EngineError::EstadoInvalido { .. } => "INVALID_STATE",
            EngineError::TiempoAgotado => "DEADLINE_EXCEEDED",
            EngineError::Almacen(_) => "STORE_ERROR",
            EngineError::ServicioNoDisponible(_) => "SERVICE_UNAVAILABLE",
            EngineError::Interno(_) => "INTERNAL",
        }
    }

    /// Payload estructurado con `kind`, mensaje para el operador y contexto.
    /// La capa de transporte lo serializa tal cual.
    pub fn to_payload(&self) -> serde_json::Value {
        let context = match self {
            EngineError::LoteInvalido(filas) => Some(json!({ "filas": filas })),
            EngineError::TarifaNoEncontrada { origen, destino } => {
                Some(json!({ "origen": origen, "destino": destino }))
            }
            EngineError::TarifaSinTipoVehiculo {
                origen,
                destino,
                tipo_vehiculo,
            } => Some(json!({
                "origen": origen,
                "destino": destino,
                "tipo_vehiculo": tipo_vehiculo,
            })),
            EngineError::OtrosCostosNoEncontrados(tipo) => {
                Some(json!({ "tipo_vehiculo": tipo }))
            }
            EngineError::NoAutorizado {
                usuario,
                rol,
                operacion,
            } => Some(json!({
                "usuario": usuario,
                "rol": rol,
                "operacion": operacion,
            })),
            EngineError::RegionNoPermitida {
                usuario,
                region_usuario,
                region_vehiculo,
            } => Some(json!({
                "usuario": usuario,
                "region_usuario": region_usuario,
                "region_vehiculo": region_vehiculo,
            })),
            EngineError::VehiculoNoEncontrado(id) => Some(json!({ "vehiculo": id })),
            EngineError::PedidoNoEncontrado(id) => Some(json!({ "pedido": id })),
            EngineError::EstadoInvalido {
                vehiculo,
                estado,
                operacion,
            } => Some(json!({
                "vehiculo": vehiculo,
                "estado": estado,
                "operacion": operacion,
            })),
            _ => None,
        };

        json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "context": context,
        })
    }
}

/// Resultado tipado para operaciones del motor
pub type EngineResult<T> = Result<T, EngineError>;

/// Función helper para errores de validación
pub fn validation_error(message: impl Into<String>) -> EngineError {
    EngineError::Validacion(message.into())
}

/// Función helper para errores de estado inválido
pub fn invalid_state_error(vehiculo: &str, estado: &str, operacion: &str) -> EngineError {
    EngineError::EstadoInvalido {
        vehiculo: vehiculo.to_string(),
        estado: estado.to_string(),
        operacion: operacion.to_string(),
    }
}

/// Función helper para errores de vehículo no encontrado
pub fn bundle_not_found(vehiculo: &str) -> EngineError {
    EngineError::VehiculoNoEncontrado(vehiculo.to_string())
}
