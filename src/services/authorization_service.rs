//! Máquina de estados de autorización
//!
//! Opera el ciclo de vida de un despacho después de la ingesta:
//! autorización manual por coordinador o control, confirmación de
//! preautorizados, carga de números de pedido del sistema de facturación
//! (con archivado cuando el despacho queda completo), eliminación y
//! listado regional. Toda mutación toma el candado del vehículo para
//! serializar con ajustes, fusiones y divisiones.

use std::sync::Arc;
use tracing::{info, warn};

use crate::models::auth::RequestContext;
use crate::models::bundle::{group_bundles, BundleSummary, BundleUpdate};
use crate::models::pedido::{EstadoPedido, Pedido};
use crate::repositories::pedido_repository::BundleStore;
use crate::services::access_policy::{self, Capability};
use crate::utils::errors::{bundle_not_found, invalid_state_error, EngineResult};
use crate::utils::locks::BundleLocks;

/// Resultado de cargar un número de pedido sobre un consecutivo integra
#[derive(Debug, Clone, serde::Serialize)]
pub struct PedidoNumberOutcome {
    pub integra_consecutive: String,
    pub updated: u64,
    /// Despacho archivado porque todas sus líneas quedaron numeradas
    pub archived: bool,
    pub error: Option<String>,
}

/// Servicio de autorización y ciclo de vida
pub struct AuthorizationService {
    store: Arc<dyn BundleStore>,
    locks: Arc<BundleLocks>,
}

impl AuthorizationService {
    pub fn new(store: Arc<dyn BundleStore>, locks: Arc<BundleLocks>) -> Self {
        Self { store, locks }
    }

    async fn lines_or_not_found(&self, vehicle_consecutive: &str) -> EngineResult<Vec<Pedido>> {
        let lines = self.store.get_lines_by_bundle(vehicle_consecutive).await?;
        if lines.is_empty() {
            return Err(bundle_not_found(vehicle_consecutive));
        }
        Ok(lines)
    }

    /// Autoriza manualmente un despacho en REQUIRES_COORDINATOR o
    /// REQUIRES_CONTROL. El nivel requerido lo dicta el estado actual.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        vehicle_consecutive: &str,
        observations: &str,
    ) -> EngineResult<()> {
        let _guard = self.locks.acquire(vehicle_consecutive).await;
        let lines = self.lines_or_not_found(vehicle_consecutive).await?;
        let state = lines[0].state;

        let capability = access_policy::authorize_capability_for(state).ok_or_else(|| {
            invalid_state_error(vehicle_consecutive, state.as_str(), "authorize")
        })?;
        access_policy::check(&ctx.user, capability, &lines[0].region)?;
        ctx.check_deadline()?;

        let update = BundleUpdate {
            state: Some(EstadoPedido::Authorized),
            authorized_by: Some(ctx.user.username.clone()),
            authorization_ts: Some(ctx.now.to_rfc3339()),
            approver_observations: Some(observations.trim().to_string()),
            ..Default::default()
        };
        self.store
            .update_all_lines_of_bundle(vehicle_consecutive, &update)
            .await?;

        info!(
            vehiculo = vehicle_consecutive,
            usuario = %ctx.user.username,
            estado_previo = state.as_str(),
            "despacho autorizado"
        );
        Ok(())
    }

    /// Confirma un despacho preautorizado por el sistema, dejándolo
    /// AUTHORIZED sin pisar la marca de preautorización
    pub async fn confirm_preauthorized(
        &self,
        ctx: &RequestContext,
        vehicle_consecutive: &str,
    ) -> EngineResult<()> {
        let _guard = self.locks.acquire(vehicle_consecutive).await;
        let lines = self.lines_or_not_found(vehicle_consecutive).await?;
        let state = lines[0].state;

        if state != EstadoPedido::Preauthorized {
            return Err(invalid_state_error(
                vehicle_consecutive,
                state.as_str(),
                "confirm_preauthorized",
            ));
        }
        access_policy::check(
            &ctx.user,
            Capability::ConfirmPreauthorized,
            &lines[0].region,
        )?;
        ctx.check_deadline()?;

        let update = BundleUpdate {
            state: Some(EstadoPedido::Authorized),
            ..Default::default()
        };
        self.store
            .update_all_lines_of_bundle(vehicle_consecutive, &update)
            .await?;

        info!(
            vehiculo = vehicle_consecutive,
            usuario = %ctx.user.username,
            "preautorizado confirmado"
        );
        Ok(())
    }

    /// Carga números de pedido del sistema de facturación sobre líneas
    /// AUTHORIZED, por consecutivo integra. Cada par se procesa de forma
    /// independiente; un par que falla no detiene a los demás. Cuando todas
    /// las líneas de un despacho quedan numeradas, el despacho pasa a
    /// COMPLETED y se archiva.
    pub async fn load_pedido_numbers(
        &self,
        ctx: &RequestContext,
        pairs: &[(String, String)],
    ) -> EngineResult<Vec<PedidoNumberOutcome>> {
        access_policy::check(&ctx.user, Capability::IngestBatch, &ctx.user.region)?;

        let mut outcomes = Vec::with_capacity(pairs.len());
        for (integra, pedido_number) in pairs {
            ctx.check_deadline()?;
            let outcome = self
                .load_one_pedido_number(ctx, integra, pedido_number)
                .await;
            match outcome {
                Ok(o) => outcomes.push(o),
                Err(e) => {
                    warn!(integra = %integra, error = %e, "número de pedido rechazado");
                    outcomes.push(PedidoNumberOutcome {
                        integra_consecutive: integra.clone(),
                        updated: 0,
                        archived: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    async fn load_one_pedido_number(
        &self,
        ctx: &RequestContext,
        integra: &str,
        pedido_number: &str,
    ) -> EngineResult<PedidoNumberOutcome> {
        let candidatas = self.store.find_by_integra(integra).await?;
        let vehiculo = match candidatas.first() {
            Some(line) => line.vehicle_consecutive.clone(),
            None => {
                return Ok(PedidoNumberOutcome {
                    integra_consecutive: integra.to_string(),
                    updated: 0,
                    archived: false,
                    error: Some(format!(
                        "No hay líneas activas con el consecutivo {}",
                        integra
                    )),
                })
            }
        };

        let _guard = self.locks.acquire(&vehiculo).await;
        // Releer bajo candado; otra operación pudo mover el despacho
        let mut lines = self.store.get_lines_by_bundle(&vehiculo).await?;

        // Verificar el estado de todas las líneas del consecutivo antes
        // de escribir la primera
        if let Some(line) = lines
            .iter()
            .filter(|l| l.integra_consecutive == integra)
            .find(|l| l.state != EstadoPedido::Authorized)
        {
            return Err(invalid_state_error(
                &vehiculo,
                line.state.as_str(),
                "load_pedido_numbers",
            ));
        }

        let mut updated = 0u64;
        for line in lines.iter_mut().filter(|l| l.integra_consecutive == integra) {
            // Idempotente: volver a cargar el mismo número no es error
            line.pedido_number = Some(pedido_number.trim().to_string());
            line.state = EstadoPedido::Completed;
            line.pedido_actualizado_vulcano_por = Some(ctx.user.username.clone());
            line.fecha_actualizacion_vulcano = Some(ctx.now);
            self.store.replace_line(line.clone()).await?;
            updated += 1;
        }

        if updated == 0 {
            return Ok(PedidoNumberOutcome {
                integra_consecutive: integra.to_string(),
                updated: 0,
                archived: false,
                error: Some(format!(
                    "No hay líneas activas con el consecutivo {}",
                    integra
                )),
            });
        }

        let todas_numeradas = lines
            .iter()
            .all(|l| l.pedido_number.is_some() && l.state == EstadoPedido::Completed);
        let archived = if todas_numeradas {
            self.store.archive_bundle(&vehiculo).await?;
            info!(vehiculo = %vehiculo, "despacho completado y archivado");
            true
        } else {
            false
        };

        Ok(PedidoNumberOutcome {
            integra_consecutive: integra.to_string(),
            updated,
            archived,
            error: None,
        })
    }

    /// Elimina un despacho activo completo. Un despacho con alguna línea
    /// COMPLETED ya no se puede eliminar.
    pub async fn delete_bundle(
        &self,
        ctx: &RequestContext,
        vehicle_consecutive: &str,
    ) -> EngineResult<u64> {
        let _guard = self.locks.acquire(vehicle_consecutive).await;
        let lines = self.lines_or_not_found(vehicle_consecutive).await?;
        access_policy::check(&ctx.user, Capability::DeleteBundle, &lines[0].region)?;

        if let Some(line) = lines.iter().find(|l| l.state.is_terminal()) {
            return Err(invalid_state_error(
                vehicle_consecutive,
                line.state.as_str(),
                "delete_bundle",
            ));
        }
        ctx.check_deadline()?;

        let deleted = self.store.delete_bundle(vehicle_consecutive).await?;
        info!(
            vehiculo = vehicle_consecutive,
            lineas = deleted,
            usuario = %ctx.user.username,
            "despacho eliminado"
        );
        Ok(deleted)
    }

    /// Listado de despachos activos visibles para el usuario. Los roles
    /// con visibilidad global ven todo; los regionales ven su regional y
    /// la emparejada.
    pub async fn list_bundles(&self, ctx: &RequestContext) -> EngineResult<Vec<BundleSummary>> {
        let todas = self.store.list_active(None).await?;
        let visibles: Vec<Pedido> = if access_policy::role_has_capability(
            ctx.user.role,
            Capability::ViewAllRegions,
        ) {
            todas
        } else {
            todas
                .into_iter()
                .filter(|p| access_policy::region_allows(&ctx.user, &p.region))
                .collect()
        };
        Ok(group_bundles(visibles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::{RequestContext, UserInfo, UserRole};
    use crate::models::pedido::pedido_de_prueba;
    use crate::repositories::pedido_repository::MemoryBundleStore;

    fn servicio() -> (AuthorizationService, Arc<MemoryBundleStore>) {
        let store = Arc::new(MemoryBundleStore::new());
        let service = AuthorizationService::new(store.clone(), Arc::new(BundleLocks::new()));
        (service, store)
    }

    fn ctx(role: UserRole, region: &str) -> RequestContext {
        RequestContext::new(UserInfo {
            username: "teresa".into(),
            role,
            region: region.into(),
        })
    }

    #[tokio::test]
    async fn test_autorizar_requiere_nivel_del_estado() {
        let (service, store) = servicio();
        let mut line = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        line.state = EstadoPedido::RequiresControl;
        store.insert_line(line).await.unwrap();

        // Un coordinador no puede autorizar REQUIRES_CONTROL
        let err = service
            .authorize(&ctx(UserRole::Coordinator, "FUNZA"), "V1", "ok")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN_ROLE");

        service
            .authorize(&ctx(UserRole::Control, "FUNZA"), "V1", "revisado")
            .await
            .unwrap();
        let lines = store.get_lines_by_bundle("V1").await.unwrap();
        assert_eq!(lines[0].state, EstadoPedido::Authorized);
        assert_eq!(lines[0].authorized_by, "teresa");
        assert_eq!(lines[0].approver_observations, "revisado");
    }

    #[tokio::test]
    async fn test_autorizar_un_autorizado_es_estado_invalido() {
        let (service, store) = servicio();
        let mut line = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        line.state = EstadoPedido::Authorized;
        store.insert_line(line).await.unwrap();

        let err = service
            .authorize(&ctx(UserRole::Admin, "FUNZA"), "V1", "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_confirmar_preautorizado() {
        let (service, store) = servicio();
        let line = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        let autor_original = line.authorized_by.clone();
        store.insert_line(line).await.unwrap();

        service
            .confirm_preauthorized(&ctx(UserRole::Dispatcher, "FUNZA"), "V1")
            .await
            .unwrap();
        let lines = store.get_lines_by_bundle("V1").await.unwrap();
        assert_eq!(lines[0].state, EstadoPedido::Authorized);
        // La marca de preautorización no se pisa
        assert_eq!(lines[0].authorized_by, autor_original);
    }

    #[tokio::test]
    async fn test_cargar_numeros_archiva_cuando_todo_queda_numerado() {
        let (service, store) = servicio();
        let mut a = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        let mut b = pedido_de_prueba("V1", "I2", "NEIVA", 2000, 200_000);
        a.state = EstadoPedido::Authorized;
        b.state = EstadoPedido::Authorized;
        store.insert_lines(vec![a, b]).await.unwrap();

        let outcomes = service
            .load_pedido_numbers(
                &ctx(UserRole::Admin, "FUNZA"),
                &[("I1".to_string(), "PN-100".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(outcomes[0].updated, 1);
        assert!(!outcomes[0].archived);

        let outcomes = service
            .load_pedido_numbers(
                &ctx(UserRole::Admin, "FUNZA"),
                &[("I2".to_string(), "PN-101".to_string())],
            )
            .await
            .unwrap();
        assert!(outcomes[0].archived);
        assert!(store.get_lines_by_bundle("V1").await.unwrap().is_empty());
        assert_eq!(store.completed_lines("V1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cargar_numero_sobre_no_autorizado_falla_solo_ese_par() {
        let (service, store) = servicio();
        let mut a = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        a.state = EstadoPedido::Authorized;
        let b = pedido_de_prueba("V2", "I2", "NEIVA", 2000, 200_000);
        store.insert_lines(vec![a, b]).await.unwrap();

        let outcomes = service
            .load_pedido_numbers(
                &ctx(UserRole::Admin, "FUNZA"),
                &[
                    ("I2".to_string(), "PN-200".to_string()),
                    ("I1".to_string(), "PN-201".to_string()),
                ],
            )
            .await
            .unwrap();
        assert!(outcomes[0].error.is_some());
        assert_eq!(outcomes[1].updated, 1);
    }

    #[tokio::test]
    async fn test_eliminar_despacho_con_linea_completada_falla() {
        let (service, store) = servicio();
        let mut a = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        a.state = EstadoPedido::Completed;
        let b = pedido_de_prueba("V1", "I2", "NEIVA", 2000, 200_000);
        store.insert_lines(vec![a, b]).await.unwrap();

        let err = service
            .delete_bundle(&ctx(UserRole::Admin, "FUNZA"), "V1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_STATE");

        // Un coordinador nunca elimina
        let err = service
            .delete_bundle(&ctx(UserRole::Coordinator, "FUNZA"), "V1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN_ROLE");
    }

    #[tokio::test]
    async fn test_listado_respeta_visibilidad_regional() {
        let (service, store) = servicio();
        let mut a = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        a.region = "FUNZA".into();
        let mut b = pedido_de_prueba("V2", "I2", "NEIVA", 2000, 200_000);
        b.region = "CELTA".into();
        let mut c = pedido_de_prueba("V3", "I3", "IBAGUE", 500, 50_000);
        c.region = "YUMBO".into();
        store.insert_lines(vec![a, b, c]).await.unwrap();

        // El despachador de FUNZA ve FUNZA y la emparejada CELTA
        let bundles = service
            .list_bundles(&ctx(UserRole::Dispatcher, "FUNZA"))
            .await
            .unwrap();
        assert_eq!(bundles.len(), 2);

        // El administrador ve todo
        let bundles = service
            .list_bundles(&ctx(UserRole::Admin, "YUMBO"))
            .await
            .unwrap();
        assert_eq!(bundles.len(), 3);
    }
}
