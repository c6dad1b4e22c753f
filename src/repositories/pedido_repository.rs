//! Repositorio de pedidos (almacén de despachos)
//!
//! Abstracción sobre el almacén documental de pedidos, con sus dos
//! colecciones: activos y completados. Toda escritura sobre un despacho se
//! aplica como una operación única sobre sus líneas, y el archivado es
//! copiar-y-borrar por despacho. La serialización por vehículo la impone
//! el servicio mediante `utils::locks`; el almacén solo garantiza que cada
//! operación individual sea atómica.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::bundle::BundleUpdate;
use crate::models::pedido::Pedido;
use crate::utils::errors::{EngineError, EngineResult};

/// Contrato del almacén de despachos
#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Inserta todas las líneas de un lote; todo o nada
    async fn insert_lines(&self, lines: Vec<Pedido>) -> EngineResult<()>;

    /// Inserta una línea individual (clones de ajuste y división)
    async fn insert_line(&self, line: Pedido) -> EngineResult<()>;

    /// Todas las líneas activas de un despacho
    async fn get_lines_by_bundle(&self, vehicle_consecutive: &str) -> EngineResult<Vec<Pedido>>;

    /// Aplica una actualización multi-campo a todas las líneas del
    /// despacho en una sola pasada; devuelve cuántas líneas tocó
    async fn update_all_lines_of_bundle(
        &self,
        vehicle_consecutive: &str,
        update: &BundleUpdate,
    ) -> EngineResult<u64>;

    /// Reemplaza una línea completa, ubicada por su id
    async fn replace_line(&self, line: Pedido) -> EngineResult<()>;

    /// Mueve líneas a otro despacho (fusiones); devuelve cuántas movió
    async fn move_lines(&self, line_ids: &[Uuid], new_bundle_id: &str) -> EngineResult<u64>;

    /// Elimina todas las líneas activas de un despacho
    async fn delete_bundle(&self, vehicle_consecutive: &str) -> EngineResult<u64>;

    /// Copia las líneas del despacho a la colección de completados y las
    /// borra de activos, atómicamente por despacho
    async fn archive_bundle(&self, vehicle_consecutive: &str) -> EngineResult<u64>;

    /// Líneas activas, opcionalmente filtradas por regional
    async fn list_active(&self, region: Option<&str>) -> EngineResult<Vec<Pedido>>;

    /// Líneas activas de un consecutivo integra
    async fn find_by_integra(&self, integra_consecutive: &str) -> EngineResult<Vec<Pedido>>;

    /// Si existe alguna línea activa con ese consecutivo integra
    async fn integra_active_exists(&self, integra_consecutive: &str) -> EngineResult<bool>;

    /// Líneas en estado AUTHORIZED (para exportación)
    async fn authorized_lines(&self) -> EngineResult<Vec<Pedido>>;

    /// Líneas archivadas de un despacho
    async fn completed_lines(&self, vehicle_consecutive: &str) -> EngineResult<Vec<Pedido>>;
}

/// Implementación en memoria de las dos colecciones
#[derive(Default)]
pub struct MemoryBundleStore {
    activos: RwLock<Vec<Pedido>>,
    completados: RwLock<Vec<Pedido>>,
}

impl MemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BundleStore for MemoryBundleStore {
    async fn insert_lines(&self, lines: Vec<Pedido>) -> EngineResult<()> {
        let mut activos = self.activos.write().await;
        debug!(cantidad = lines.len(), "insertando lote de pedidos");
        activos.extend(lines);
        Ok(())
    }

    async fn insert_line(&self, line: Pedido) -> EngineResult<()> {
        self.activos.write().await.push(line);
        Ok(())
    }

    async fn get_lines_by_bundle(&self, vehicle_consecutive: &str) -> EngineResult<Vec<Pedido>> {
        let activos = self.activos.read().await;
        Ok(activos
            .iter()
            .filter(|p| p.vehicle_consecutive == vehicle_consecutive)
            .cloned()
            .collect())
    }

    async fn update_all_lines_of_bundle(
        &self,
        vehicle_consecutive: &str,
        update: &BundleUpdate,
    ) -> EngineResult<u64> {
        let mut activos = self.activos.write().await;
        let mut count = 0u64;
        for pedido in activos
            .iter_mut()
            .filter(|p| p.vehicle_consecutive == vehicle_consecutive)
        {
            update.apply(pedido);
            count += 1;
        }
        debug!(
            vehiculo = vehicle_consecutive,
            lineas = count,
            "actualización multi-campo aplicada"
        );
        Ok(count)
    }

    async fn replace_line(&self, line: Pedido) -> EngineResult<()> {
        let mut activos = self.activos.write().await;
        match activos.iter_mut().find(|p| p.id == line.id) {
            Some(existing) => {
                *existing = line;
                Ok(())
            }
            None => Err(EngineError::PedidoNoEncontrado(line.id.to_string())),
        }
    }

    async fn move_lines(&self, line_ids: &[Uuid], new_bundle_id: &str) -> EngineResult<u64> {
        let mut activos = self.activos.write().await;
        let mut count = 0u64;
        for pedido in activos.iter_mut().filter(|p| line_ids.contains(&p.id)) {
            pedido.vehicle_consecutive = new_bundle_id.to_string();
            count += 1;
        }
        Ok(count)
    }

    async fn delete_bundle(&self, vehicle_consecutive: &str) -> EngineResult<u64> {
        let mut activos = self.activos.write().await;
        let before = activos.len();
        activos.retain(|p| p.vehicle_consecutive != vehicle_consecutive);
        Ok((before - activos.len()) as u64)
    }

    async fn archive_bundle(&self, vehicle_consecutive: &str) -> EngineResult<u64> {
        // Copiar y luego borrar, con ambas colecciones bajo candado para
        // que ninguna lectura vea el despacho duplicado o ausente
        let mut activos = self.activos.write().await;
        let mut completados = self.completados.write().await;

        let lineas: Vec<Pedido> = activos
            .iter()
            .filter(|p| p.vehicle_consecutive == vehicle_consecutive)
            .cloned()
            .collect();
        let count = lineas.len() as u64;
        if count == 0 {
            return Err(EngineError::VehiculoNoEncontrado(
                vehicle_consecutive.to_string(),
            ));
        }

        completados.extend(lineas);
        activos.retain(|p| p.vehicle_consecutive != vehicle_consecutive);
        debug!(vehiculo = vehicle_consecutive, lineas = count, "despacho archivado");
        Ok(count)
    }

    async fn list_active(&self, region: Option<&str>) -> EngineResult<Vec<Pedido>> {
        let activos = self.activos.read().await;
        Ok(activos
            .iter()
            .filter(|p| region.map_or(true, |r| p.region == r))
            .cloned()
            .collect())
    }

    async fn find_by_integra(&self, integra_consecutive: &str) -> EngineResult<Vec<Pedido>> {
        let activos = self.activos.read().await;
        Ok(activos
            .iter()
            .filter(|p| p.integra_consecutive == integra_consecutive)
            .cloned()
            .collect())
    }

    async fn integra_active_exists(&self, integra_consecutive: &str) -> EngineResult<bool> {
        let activos = self.activos.read().await;
        Ok(activos
            .iter()
            .any(|p| p.integra_consecutive == integra_consecutive))
    }

    async fn authorized_lines(&self) -> EngineResult<Vec<Pedido>> {
        let activos = self.activos.read().await;
        Ok(activos
            .iter()
            .filter(|p| p.state == crate::models::pedido::EstadoPedido::Authorized)
            .cloned()
            .collect())
    }

    async fn completed_lines(&self, vehicle_consecutive: &str) -> EngineResult<Vec<Pedido>> {
        let completados = self.completados.read().await;
        Ok(completados
            .iter()
            .filter(|p| p.vehicle_consecutive == vehicle_consecutive)
            .cloned()
            .collect())
    }
}
