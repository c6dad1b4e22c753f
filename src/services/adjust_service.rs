//! Ajuste de despachos
//!
//! Un ajuste corrige un despacho antes de su facturación: cambio de
//! destino, corrección del tipo o los kilos SICETAC y sobrescritura de
//! componentes del costo solicitado. Los destinos de bodega especial
//! insertan una línea de cantidad cero que representa el traslado. Todo
//! ajuste reclasifica el despacho con el núcleo de tarificación y escribe
//! espejos y estado en una sola actualización.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::cache::TarifaCache;
use crate::config::EnvironmentConfig;
use crate::models::auth::RequestContext;
use crate::models::bundle::{AuditUpdate, BundleUpdate};
use crate::models::pedido::{EstadoPedido, Pedido, NA, SYSTEM_USER};
use crate::repositories::pedido_repository::BundleStore;
use crate::services::access_policy::{self, Capability};
use crate::services::pricing::{self, CostOverrides};
use crate::utils::city::{city_key, same_city};
use crate::utils::errors::{bundle_not_found, invalid_state_error, validation_error, EngineResult};
use crate::utils::locks::BundleLocks;

/// Ciudades de bodega especial: el ajuste hacia una de ellas inserta la
/// línea de traslado a la bodega FKC
const BODEGAS_ESPECIALES: &[&str] = &["GIRARDOTA", "BARRANQUILLA", "YUMBO", "BUCARAMANGA"];

const SUFIJO_BODEGA: &str = " | SE ENVIA A BODEGA";

/// Solicitud de ajuste de un despacho
#[derive(Debug, Clone, Default)]
pub struct AdjustRequest {
    pub vehicle_consecutive: String,
    /// Nuevo tipo para tarificar, si el operador lo corrige
    pub vehicle_type_sicetac: Option<String>,
    /// Total de kilos SICETAC corregido para los espejos
    pub total_kilos_sicetac: Option<Decimal>,
    pub overrides: CostOverrides,
    pub new_destination: Option<String>,
    /// Promueve uno de los destinos reales del despacho a destino
    pub destination_from_real: Option<String>,
    pub note: Option<String>,
}

/// Servicio de ajuste
pub struct AdjustService {
    store: Arc<dyn BundleStore>,
    tarifas: Arc<TarifaCache>,
    locks: Arc<BundleLocks>,
    config: EnvironmentConfig,
}

impl AdjustService {
    pub fn new(
        store: Arc<dyn BundleStore>,
        tarifas: Arc<TarifaCache>,
        locks: Arc<BundleLocks>,
        config: EnvironmentConfig,
    ) -> Self {
        Self {
            store,
            tarifas,
            locks,
            config,
        }
    }

    pub async fn adjust(&self, ctx: &RequestContext, req: &AdjustRequest) -> EngineResult<()> {
        let vehiculo = req.vehicle_consecutive.as_str();
        let _guard = self.locks.acquire(vehiculo).await;

        let mut lines = self.store.get_lines_by_bundle(vehiculo).await?;
        if lines.is_empty() {
            return Err(bundle_not_found(vehiculo));
        }
        access_policy::check(&ctx.user, Capability::AdjustBundle, &lines[0].region)?;

        if let Some(line) = lines.iter().find(|l| l.state.is_terminal()) {
            return Err(invalid_state_error(vehiculo, line.state.as_str(), "adjust"));
        }

        // Resolver el destino efectivo y, si aplica, la línea de bodega
        let mut nueva_linea: Option<Pedido> = None;
        let mut destino = lines[0].destination.clone();
        let mut destino_cambiado = false;

        if let Some(nuevo) = &req.new_destination {
            let nuevo = nuevo.trim();
            if nuevo.is_empty() {
                return Err(validation_error("El nuevo destino no puede estar vacío"));
            }
            let clave = city_key(nuevo);
            if BODEGAS_ESPECIALES.contains(&clave.as_str()) {
                let ya_existe = lines
                    .iter()
                    .any(|l| same_city(&l.real_destination, &clave));
                if !ya_existe {
                    nueva_linea = Some(linea_de_bodega(&lines[0], &clave));
                }
                destino = clave;
            } else {
                destino = nuevo.to_uppercase();
            }
            destino_cambiado = true;
        } else if let Some(real) = &req.destination_from_real {
            let coincide = lines.iter().any(|l| same_city(&l.real_destination, real));
            if !coincide {
                return Err(validation_error(format!(
                    "El destino '{}' no corresponde a ningún destino real del despacho",
                    real
                )));
            }
            destino = city_key(real);
            destino_cambiado = true;
        }

        let tipo_sicetac = req
            .vehicle_type_sicetac
            .as_deref()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty());

        // Clasificar con la línea de bodega ya incluida
        if let Some(linea) = &nueva_linea {
            lines.push(linea.clone());
        }
        let billing_type = tipo_sicetac
            .clone()
            .unwrap_or_else(|| lines[0].billing_vehicle_type().to_string());

        let tarifa = self.tarifas.tariff(&lines[0].origin, &destino).await?;
        let otros = self.tarifas.other_costs(&billing_type).await?;
        let classification = pricing::classify(
            &lines,
            &req.overrides,
            &billing_type,
            &tarifa,
            &otros,
            self.config.umbral_coordinador,
        )?;
        let mirrors = pricing::build_mirrors(&lines, &classification, req.total_kilos_sicetac);

        let (authorized_by, authorization_ts) =
            if classification.state == EstadoPedido::Preauthorized {
                (SYSTEM_USER.to_string(), ctx.now.to_rfc3339())
            } else {
                (NA.to_string(), NA.to_string())
            };

        ctx.check_deadline()?;

        if let Some(linea) = nueva_linea {
            self.store.insert_line(linea).await?;
        }

        let update = BundleUpdate {
            state: Some(classification.state),
            mirrors: Some(mirrors),
            destination: destino_cambiado.then(|| destino.clone()),
            vehicle_type_sicetac: tipo_sicetac,
            authorized_by: Some(authorized_by),
            authorization_ts: Some(authorization_ts),
            adjustment_observations: req.note.as_ref().map(|n| n.trim().to_string()),
            audit: AuditUpdate {
                usuario_ajusta_destino: Some(ctx.user.username.clone()),
                fecha_ajusta_destino: Some(ctx.now),
                ..Default::default()
            },
            ..Default::default()
        };
        self.store.update_all_lines_of_bundle(vehiculo, &update).await?;

        info!(
            vehiculo = vehiculo,
            destino = %destino,
            estado = classification.state.as_str(),
            usuario = %ctx.user.username,
            "despacho ajustado"
        );
        Ok(())
    }
}

/// Línea de cantidad cero que representa el traslado a la bodega especial
fn linea_de_bodega(primera: &Pedido, ciudad: &str) -> Pedido {
    let mut linea = primera.clone();
    linea.id = Uuid::new_v4();
    linea.real_destination = ciudad.to_string();
    linea.unload_location = format!("FKC_INTEGRA_{}", ciudad);
    linea.observations = format!("{}{}", primera.observations, SUFIJO_BODEGA);
    linea.cajas = 0;
    linea.kilos = Decimal::ZERO;
    linea.kilos_sicetac = Decimal::ZERO;
    linea.declared_value = Decimal::ZERO;
    linea.insurance = Decimal::ZERO;
    linea.requested_freight = Decimal::ZERO;
    linea.real_freight = Decimal::ZERO;
    linea.detour = Decimal::ZERO;
    linea.load_unload = Decimal::ZERO;
    linea.load_unload_kabi = Decimal::ZERO;
    linea.extra_point = Decimal::ZERO;
    linea.total_points = Decimal::ZERO;
    linea
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::{UserInfo, UserRole};
    use crate::models::pedido::pedido_de_prueba;
    use crate::models::tarifa::{OtrosCostos, Tarifa};
    use crate::repositories::pedido_repository::MemoryBundleStore;
    use crate::repositories::tarifa_repository::MemoryTariffStore;
    use std::collections::HashMap;

    async fn servicio() -> (AdjustService, Arc<MemoryBundleStore>) {
        let store = Arc::new(MemoryBundleStore::new());
        let tarifas = Arc::new(MemoryTariffStore::new());

        let mut base = HashMap::new();
        base.insert("TURBO".to_string(), Decimal::from(1_000_000));
        base.insert("NIES".to_string(), Decimal::from(1_400_000));
        for destino in ["BOGOTA", "YUMBO", "NEIVA"] {
            tarifas
                .insert_tarifa(Tarifa {
                    origen: "CALI".into(),
                    destino: destino.into(),
                    base: base.clone(),
                    paga_cargue_descargue: true,
                    equivalencia_centro_costo: "CC-01".into(),
                })
                .await;
        }
        for tipo in ["TURBO", "NIES"] {
            tarifas
                .insert_otros_costos(OtrosCostos {
                    tipo_vehiculo: tipo.into(),
                    valor_punto_adicional: Decimal::from(70_000),
                    valor_cargue_descargue: Decimal::from(100_000),
                })
                .await;
        }

        let cache = Arc::new(TarifaCache::new(tarifas, 600, 100));
        let service = AdjustService::new(
            store.clone(),
            cache,
            Arc::new(BundleLocks::new()),
            EnvironmentConfig::for_tests(),
        );
        (service, store)
    }

    fn ctx() -> RequestContext {
        RequestContext::new(UserInfo {
            username: "julian".into(),
            role: UserRole::Dispatcher,
            region: "FUNZA".into(),
        })
    }

    #[tokio::test]
    async fn test_ajuste_reclasifica_y_deja_auditoria() {
        let (service, store) = servicio().await;
        store
            .insert_line(pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000))
            .await
            .unwrap();

        service
            .adjust(
                &ctx(),
                &AdjustRequest {
                    vehicle_consecutive: "V1".into(),
                    overrides: CostOverrides {
                        freight: Some(Decimal::from(1_200_000)),
                        ..Default::default()
                    },
                    note: Some("flete renegociado".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let lines = store.get_lines_by_bundle("V1").await.unwrap();
        // 1200000 sobre un teórico de 1100000 supera el umbral del 7%
        assert_eq!(lines[0].state, EstadoPedido::RequiresControl);
        assert_eq!(lines[0].authorized_by, NA);
        assert_eq!(lines[0].usuario_ajusta_destino.as_deref(), Some("julian"));
        assert_eq!(lines[0].adjustment_observations, "flete renegociado");
    }

    #[tokio::test]
    async fn test_nuevo_destino_se_normaliza_a_mayusculas() {
        let (service, store) = servicio().await;
        store
            .insert_line(pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000))
            .await
            .unwrap();

        service
            .adjust(
                &ctx(),
                &AdjustRequest {
                    vehicle_consecutive: "V1".into(),
                    new_destination: Some("  neiva ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let lines = store.get_lines_by_bundle("V1").await.unwrap();
        assert_eq!(lines[0].destination, "NEIVA");
    }

    #[tokio::test]
    async fn test_bodega_especial_inserta_linea_cero() {
        let (service, store) = servicio().await;
        store
            .insert_line(pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000))
            .await
            .unwrap();

        service
            .adjust(
                &ctx(),
                &AdjustRequest {
                    vehicle_consecutive: "V1".into(),
                    new_destination: Some("Yumbo".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let lines = store.get_lines_by_bundle("V1").await.unwrap();
        assert_eq!(lines.len(), 2);
        let bodega = lines
            .iter()
            .find(|l| l.real_destination == "YUMBO")
            .unwrap();
        assert_eq!(bodega.cajas, 0);
        assert_eq!(bodega.kilos, Decimal::ZERO);
        assert_eq!(bodega.unload_location, "FKC_INTEGRA_YUMBO");
        assert!(bodega.observations.ends_with("| SE ENVIA A BODEGA"));
        assert_eq!(bodega.integra_consecutive, "I1");
        assert!(lines.iter().all(|l| l.destination == "YUMBO"));
    }

    #[tokio::test]
    async fn test_bodega_no_se_duplica() {
        let (service, store) = servicio().await;
        let mut line = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        line.real_destination = "YUMBO".into();
        store.insert_line(line).await.unwrap();

        service
            .adjust(
                &ctx(),
                &AdjustRequest {
                    vehicle_consecutive: "V1".into(),
                    new_destination: Some("YUMBO".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(store.get_lines_by_bundle("V1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_destino_desde_real_debe_existir() {
        let (service, store) = servicio().await;
        store
            .insert_line(pedido_de_prueba("V1", "I1", "Neiva", 4000, 900_000))
            .await
            .unwrap();

        let err = service
            .adjust(
                &ctx(),
                &AdjustRequest {
                    vehicle_consecutive: "V1".into(),
                    destination_from_real: Some("IBAGUE".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION");

        service
            .adjust(
                &ctx(),
                &AdjustRequest {
                    vehicle_consecutive: "V1".into(),
                    destination_from_real: Some("neiva".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let lines = store.get_lines_by_bundle("V1").await.unwrap();
        assert_eq!(lines[0].destination, "NEIVA");
    }

    #[tokio::test]
    async fn test_ajuste_sobre_completado_falla() {
        let (service, store) = servicio().await;
        let mut line = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        line.state = EstadoPedido::Completed;
        store.insert_line(line).await.unwrap();

        let err = service
            .adjust(
                &ctx(),
                &AdjustRequest {
                    vehicle_consecutive: "V1".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_tipo_sicetac_cambia_la_base() {
        let (service, store) = servicio().await;
        store
            .insert_line(pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 1_300_000))
            .await
            .unwrap();

        service
            .adjust(
                &ctx(),
                &AdjustRequest {
                    vehicle_consecutive: "V1".into(),
                    vehicle_type_sicetac: Some("NIES".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let lines = store.get_lines_by_bundle("V1").await.unwrap();
        // Con base NIES de 1400000 el teórico sube a 1500000 y preautoriza
        assert_eq!(lines[0].state, EstadoPedido::Preauthorized);
        assert_eq!(lines[0].authorized_by, SYSTEM_USER);
        assert_eq!(lines[0].vehicle_type_sicetac.as_deref(), Some("NIES"));
        assert_eq!(lines[0].system_freight, Decimal::from(1_400_000));
    }
}
