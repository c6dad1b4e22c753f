//! Repositorio de clientes
//!
//! El maestro de clientes es un colaborador externo; el motor solo
//! necesita verificar que un NIT exista antes de aceptar una fila.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::utils::errors::EngineResult;

/// Registro mínimo de cliente
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cliente {
    pub nit: String,
    pub razon_social: String,
}

/// Contrato de consulta del maestro de clientes
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn exists(&self, nit: &str) -> EngineResult<bool>;
}

/// Implementación en memoria del maestro de clientes
#[derive(Default)]
pub struct MemoryClientDirectory {
    clientes: RwLock<HashMap<String, Cliente>>,
}

impl MemoryClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, cliente: Cliente) {
        self.clientes
            .write()
            .await
            .insert(cliente.nit.trim().to_string(), cliente);
    }
}

#[async_trait]
impl ClientDirectory for MemoryClientDirectory {
    async fn exists(&self, nit: &str) -> EngineResult<bool> {
        Ok(self.clientes.read().await.contains_key(nit.trim()))
    }
}
