//! Fusión de despachos
//!
//! Una fusión consolida dos o más despachos compatibles en el primero de
//! la solicitud: todas las líneas pasan al consecutivo de vehículo
//! destino, adoptan un solo consecutivo integra y se reclasifican con el
//! cuarteto de costos negociado para el vehículo consolidado. Los
//! candados se toman en orden alfabético para evitar interbloqueos.

use futures::future;
use rust_decimal::Decimal;
use std::collections::HashMap;
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
use crate::utils::city::same_city;
use crate::utils::errors::{bundle_not_found, invalid_state_error, validation_error, EngineResult};
use crate::utils::locks::BundleLocks;

/// Solicitud de fusión. El primer id es el despacho destino; el cuarteto
/// de costos es obligatorio porque el flete del vehículo consolidado se
/// negocia de nuevo.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub bundle_ids: Vec<String>,
    pub destination: String,
    pub billing_vehicle_type: String,
    pub freight: Decimal,
    pub load_unload: Decimal,
    pub extra_point: Decimal,
    pub detour: Decimal,
    pub note: Option<String>,
}

/// Servicio de fusión
pub struct MergeService {
    store: Arc<dyn BundleStore>,
    tarifas: Arc<TarifaCache>,
    locks: Arc<BundleLocks>,
    config: EnvironmentConfig,
}

impl MergeService {
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

    pub async fn merge(&self, ctx: &RequestContext, req: &MergeRequest) -> EngineResult<String> {
        // Deduplicar conservando el orden: el primer id es el destino
        let mut ids: Vec<String> = Vec::with_capacity(req.bundle_ids.len());
        for id in &req.bundle_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        if ids.len() < 2 {
            return Err(validation_error(
                "Una fusión requiere al menos dos despachos distintos",
            ));
        }
        let destino = req.destination.trim().to_uppercase();
        if destino.is_empty() {
            return Err(validation_error("El destino de la fusión es obligatorio"));
        }
        let billing_type = req.billing_vehicle_type.trim().to_uppercase();
        if billing_type.is_empty() {
            return Err(validation_error(
                "El tipo de vehículo de la fusión es obligatorio",
            ));
        }

        let _guards = self.locks.acquire_many(&ids).await;

        let cargas = future::try_join_all(
            ids.iter().map(|id| self.store.get_lines_by_bundle(id)),
        )
        .await?;
        let mut por_despacho: Vec<(String, Vec<Pedido>)> = Vec::with_capacity(ids.len());
        for (id, lines) in ids.iter().cloned().zip(cargas) {
            if lines.is_empty() {
                return Err(bundle_not_found(&id));
            }
            por_despacho.push((id, lines));
        }

        let primera = &por_despacho[0].1[0];
        access_policy::check(&ctx.user, Capability::MergeSplit, &primera.region)?;

        // Homogeneidad: estados previos a autorización, misma regional y origen
        for (id, lines) in &por_despacho {
            for line in lines {
                if !line.state.is_pre_authorization() {
                    return Err(invalid_state_error(id, line.state.as_str(), "merge"));
                }
            }
            if lines[0].region != primera.region {
                return Err(validation_error(format!(
                    "Los despachos a fusionar pertenecen a regionales distintas ({} y {})",
                    primera.region, lines[0].region
                )));
            }
            if !same_city(&lines[0].origin, &primera.origin) {
                return Err(validation_error(format!(
                    "Los despachos a fusionar tienen orígenes distintos ({} y {})",
                    primera.origin, lines[0].origin
                )));
            }
        }

        let target = ids[0].clone();
        let integra = integra_mas_frecuente(&por_despacho[0].1);

        let ids_a_mover: Vec<Uuid> = por_despacho
            .iter()
            .skip(1)
            .flat_map(|(_, lines)| lines.iter().map(|l| l.id))
            .collect();

        // Clasificar el consolidado en memoria con el cuarteto negociado.
        // Nada se escribe en el almacén hasta que la tarifa y la
        // clasificación del consolidado estén resueltas.
        let todas: Vec<Pedido> = por_despacho
            .into_iter()
            .flat_map(|(_, lines)| lines)
            .collect();
        let overrides =
            CostOverrides::all(req.freight, req.load_unload, req.extra_point, req.detour);
        let tarifa = self.tarifas.tariff(&todas[0].origin, &destino).await?;
        let otros = self.tarifas.other_costs(&billing_type).await?;
        let classification = pricing::classify(
            &todas,
            &overrides,
            &billing_type,
            &tarifa,
            &otros,
            self.config.umbral_coordinador,
        )?;
        let mirrors = pricing::build_mirrors(&todas, &classification, None);

        ctx.check_deadline()?;
        self.store.move_lines(&ids_a_mover, &target).await?;

        let (authorized_by, authorization_ts) =
            if classification.state == EstadoPedido::Preauthorized {
                (SYSTEM_USER.to_string(), ctx.now.to_rfc3339())
            } else {
                (NA.to_string(), NA.to_string())
            };

        let update = BundleUpdate {
            state: Some(classification.state),
            mirrors: Some(mirrors),
            destination: Some(destino.clone()),
            vehicle_type_sicetac: Some(billing_type.clone()),
            integra_consecutive: Some(integra.clone()),
            authorized_by: Some(authorized_by),
            authorization_ts: Some(authorization_ts),
            audit: AuditUpdate {
                usuario_fusion: Some(ctx.user.username.clone()),
                fecha_fusion: Some(ctx.now),
                observacion_fusion: Some(
                    req.note.as_deref().unwrap_or_default().trim().to_string(),
                ),
                ..Default::default()
            },
            ..Default::default()
        };
        self.store.update_all_lines_of_bundle(&target, &update).await?;

        info!(
            destino_fusion = %target,
            despachos = ids.len(),
            integra = %integra,
            estado = classification.state.as_str(),
            usuario = %ctx.user.username,
            "despachos fusionados"
        );
        Ok(target)
    }
}

/// Consecutivo integra más frecuente entre las líneas del despacho
/// destino; los empates se resuelven por el menor lexicográfico para que
/// la fusión sea determinista
fn integra_mas_frecuente(lines: &[Pedido]) -> String {
    let mut conteo: HashMap<&str, usize> = HashMap::new();
    for line in lines {
        *conteo.entry(line.integra_consecutive.as_str()).or_insert(0) += 1;
    }
    conteo
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(integra, _)| integra.to_string())
        .unwrap_or_default()
}
