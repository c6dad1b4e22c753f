//! Usuarios y roles
//!
//! Este módulo contiene los roles del sistema, el registro de usuario que
//! entrega el directorio y el contexto de solicitud que acompaña cada
//! operación del motor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::utils::errors::{EngineError, EngineResult};

/// Roles del sistema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Coordinator,
    Control,
    Analyst,
    Dispatcher,
    Operator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Coordinator => "COORDINATOR",
            UserRole::Control => "CONTROL",
            UserRole::Analyst => "ANALYST",
            UserRole::Dispatcher => "DISPATCHER",
            UserRole::Operator => "OPERATOR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Some(UserRole::Admin),
            "COORDINATOR" => Some(UserRole::Coordinator),
            "CONTROL" => Some(UserRole::Control),
            "ANALYST" => Some(UserRole::Analyst),
            "DISPATCHER" => Some(UserRole::Dispatcher),
            "OPERATOR" => Some(UserRole::Operator),
            _ => None,
        }
    }
}

/// Información del usuario autenticado, entregada por el directorio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub role: UserRole,
    /// Regional a la que pertenece el usuario (CELTA, FUNZA, CALI, ...)
    pub region: String,
}

impl UserInfo {
    pub fn new(username: &str, role: UserRole, region: &str) -> Self {
        Self {
            username: username.to_string(),
            role,
            region: region.to_uppercase(),
        }
    }
}

/// Contexto de una solicitud: quién actúa, cuándo y hasta cuándo.
/// El deadline se propaga a toda la I/O de la operación; se verifica
/// siempre antes de escribir.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: UserInfo,
    pub now: DateTime<Utc>,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(user: UserInfo) -> Self {
        Self {
            user,
            now: Utc::now(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Falla con `TiempoAgotado` si el deadline de la solicitud ya pasó
    pub fn check_deadline(&self) -> EngineResult<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(EngineError::TiempoAgotado),
            _ => Ok(()),
        }
    }
}
