//! Repositorio de usuarios
//!
//! El directorio de usuarios es de solo lectura para el motor: resuelve
//! usuario -> rol y regional antes de toda verificación de permisos.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::auth::UserInfo;
use crate::utils::errors::{EngineError, EngineResult};

/// Contrato del directorio de usuarios
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Busca un usuario por nombre; error `USER_UNKNOWN` si no existe
    async fn find(&self, username: &str) -> EngineResult<UserInfo>;
}

/// Implementación en memoria del directorio de usuarios
#[derive(Default)]
pub struct MemoryUserDirectory {
    usuarios: RwLock<HashMap<String, UserInfo>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: UserInfo) {
        self.usuarios
            .write()
            .await
            .insert(user.username.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find(&self, username: &str) -> EngineResult<UserInfo> {
        self.usuarios
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or_else(|| EngineError::UsuarioNoEncontrado(username.to_string()))
    }
}
