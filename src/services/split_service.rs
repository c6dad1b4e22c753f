//! División de despachos
//!
//! Una división separa un despacho en hasta tres grupos: A conserva el
//! consecutivo original y B y C reciben el sufijo correspondiente. Cada
//! grupo se arma moviendo consecutivos integra completos o pelando kilos
//! de una línea (división por kilos), y al final cada grupo no vacío se
//! reclasifica por separado con el tipo de vehículo que dictan sus kilos
//! SICETAC.

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::cache::TarifaCache;
use crate::config::EnvironmentConfig;
use crate::models::auth::RequestContext;
use crate::models::bundle::{AuditUpdate, BundleUpdate};
use crate::models::pedido::{EstadoPedido, Pedido, NA, SYSTEM_USER};
use crate::models::tarifa::TipoVehiculo;
use crate::repositories::pedido_repository::BundleStore;
use crate::services::access_policy::{self, Capability};
use crate::services::pricing::{self, CostOverrides};
use crate::utils::consecutivos::con_sufijo;
use crate::utils::errors::{bundle_not_found, invalid_state_error, validation_error, EngineResult};
use crate::utils::locks::BundleLocks;

/// División por kilos: pela `kilos` SICETAC de una línea hacia el grupo.
/// `line_id` desambigua cuando el consecutivo integra no es único.
#[derive(Debug, Clone)]
pub struct KiloSplit {
    pub integra_consecutive: String,
    pub line_id: Option<Uuid>,
    pub kilos: Decimal,
}

/// Definición de un grupo B o C
#[derive(Debug, Clone, Default)]
pub struct SplitGroup {
    /// Consecutivos integra que se mueven completos al grupo
    pub integras: Vec<String>,
    pub kilo_split: Option<KiloSplit>,
    pub overrides: CostOverrides,
}

/// Solicitud de división
#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub vehicle_consecutive: String,
    /// Destino unificado de las líneas que se mueven a B y C
    pub destination: String,
    pub group_b: SplitGroup,
    pub group_c: Option<SplitGroup>,
    /// Sobrescrituras para reclasificar el grupo A restante
    pub overrides_a: CostOverrides,
    pub note: Option<String>,
}

/// Resultado de la división: consecutivos de vehículo de cada grupo
#[derive(Debug, Clone, serde::Serialize)]
pub struct SplitOutcome {
    pub group_a: String,
    pub group_b: String,
    pub group_c: Option<String>,
}

/// Servicio de división
pub struct SplitService {
    store: Arc<dyn BundleStore>,
    tarifas: Arc<TarifaCache>,
    locks: Arc<BundleLocks>,
    config: EnvironmentConfig,
}

impl SplitService {
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

    pub async fn split(&self, ctx: &RequestContext, req: &SplitRequest) -> EngineResult<SplitOutcome> {
        let origen_id = req.vehicle_consecutive.as_str();
        let destino = req.destination.trim().to_uppercase();
        if destino.is_empty() {
            return Err(validation_error("El destino de la división es obligatorio"));
        }

        let _guard = self.locks.acquire(origen_id).await;

        let lines = self.store.get_lines_by_bundle(origen_id).await?;
        if lines.is_empty() {
            return Err(bundle_not_found(origen_id));
        }
        access_policy::check(&ctx.user, Capability::MergeSplit, &lines[0].region)?;

        if let Some(line) = lines.iter().find(|l| !l.state.is_pre_authorization()) {
            return Err(invalid_state_error(origen_id, line.state.as_str(), "split"));
        }

        // El grupo A es lo que queda en el vehículo original
        let mut grupo_a = lines;
        let id_b = con_sufijo(origen_id, 'B');
        let grupo_b = extraer_grupo(&mut grupo_a, &req.group_b, &id_b, 'B', &destino)?;

        let (grupo_c, id_c) = match &req.group_c {
            Some(def) => {
                let id_c = con_sufijo(origen_id, 'C');
                let grupo = extraer_grupo(&mut grupo_a, def, &id_c, 'C', &destino)?;
                (Some(grupo), Some(id_c))
            }
            None => (None, None),
        };

        if grupo_a.is_empty() {
            return Err(validation_error(
                "La división dejaría vacío el despacho original",
            ));
        }

        // Clasificar cada grupo en memoria con el tipo que dictan sus
        // kilos SICETAC. Nada se escribe en el almacén hasta que los
        // tres grupos tengan tarifa y clasificación resueltas.
        let update_a = self
            .classify_group(ctx, &grupo_a, &req.overrides_a, None, req)
            .await?;
        let update_b = self
            .classify_group(ctx, &grupo_b.todas(), &req.group_b.overrides, Some(&destino), req)
            .await?;
        let update_c = match &grupo_c {
            Some(grupo) => {
                let overrides = req
                    .group_c
                    .as_ref()
                    .map(|g| g.overrides.clone())
                    .unwrap_or_default();
                Some(
                    self.classify_group(ctx, &grupo.todas(), &overrides, Some(&destino), req)
                        .await?,
                )
            }
            None => None,
        };

        ctx.check_deadline()?;

        // Persistir los movimientos: líneas reescritas y clones nuevos
        for grupo in [Some(&grupo_b), grupo_c.as_ref()].into_iter().flatten() {
            for line in &grupo.movidas {
                self.store.replace_line(line.clone()).await?;
            }
            for line in &grupo.clones {
                self.store.insert_line(line.clone()).await?;
            }
        }
        for line in &grupo_a {
            // Las líneas peladas por kilos quedaron con el remanente
            self.store.replace_line(line.clone()).await?;
        }

        self.store
            .update_all_lines_of_bundle(origen_id, &update_a)
            .await?;
        self.store.update_all_lines_of_bundle(&id_b, &update_b).await?;
        if let (Some(update), Some(id_c)) = (&update_c, &id_c) {
            self.store.update_all_lines_of_bundle(id_c, update).await?;
        }

        info!(
            vehiculo = origen_id,
            grupo_b = %id_b,
            grupo_c = ?id_c,
            usuario = %ctx.user.username,
            "despacho dividido"
        );
        Ok(SplitOutcome {
            group_a: origen_id.to_string(),
            group_b: id_b,
            group_c: id_c,
        })
    }

    /// Clasifica un grupo resultante y arma su actualización, sin tocar
    /// el almacén. Las búsquedas de tarifa fallidas abortan la división
    /// antes de cualquier escritura.
    async fn classify_group(
        &self,
        ctx: &RequestContext,
        lines: &[Pedido],
        overrides: &CostOverrides,
        destino: Option<&str>,
        req: &SplitRequest,
    ) -> EngineResult<BundleUpdate> {
        let kilos_sicetac: Decimal = lines.iter().map(|l| l.kilos_sicetac).sum();
        let billing_type = TipoVehiculo::from_kilos_sicetac(kilos_sicetac)
            .as_str()
            .to_string();

        let destino_tarifa = destino.unwrap_or(&lines[0].destination);
        let tarifa = self.tarifas.tariff(&lines[0].origin, destino_tarifa).await?;
        let otros = self.tarifas.other_costs(&billing_type).await?;
        let classification = pricing::classify(
            lines,
            overrides,
            &billing_type,
            &tarifa,
            &otros,
            self.config.umbral_coordinador,
        )?;
        let mirrors = pricing::build_mirrors(lines, &classification, None);

        let (authorized_by, authorization_ts) =
            if classification.state == EstadoPedido::Preauthorized {
                (SYSTEM_USER.to_string(), ctx.now.to_rfc3339())
            } else {
                (NA.to_string(), NA.to_string())
            };

        let update = BundleUpdate {
            state: Some(classification.state),
            mirrors: Some(mirrors),
            destination: destino.map(|d| d.to_string()),
            vehicle_type_sicetac: Some(billing_type),
            authorized_by: Some(authorized_by),
            authorization_ts: Some(authorization_ts),
            audit: AuditUpdate {
                usuario_division: Some(ctx.user.username.clone()),
                fecha_division: Some(ctx.now),
                observacion_division: Some(
                    req.note.as_deref().unwrap_or_default().trim().to_string(),
                ),
                ..Default::default()
            },
            ..Default::default()
        };
        Ok(update)
    }
}

/// Líneas que forman un grupo B o C
struct GrupoExtraido {
    /// Líneas completas reubicadas en el vehículo hijo
    movidas: Vec<Pedido>,
    /// Clones creados por división de kilos
    clones: Vec<Pedido>,
}

impl GrupoExtraido {
    fn todas(&self) -> Vec<Pedido> {
        self.movidas
            .iter()
            .chain(self.clones.iter())
            .cloned()
            .collect()
    }
}

/// Saca de `restantes` las líneas del grupo: consecutivos completos y, si
/// aplica, la división por kilos. Las líneas movidas adoptan el vehículo
/// hijo, el sufijo en sus consecutivos y el destino unificado.
fn extraer_grupo(
    restantes: &mut Vec<Pedido>,
    def: &SplitGroup,
    vehiculo_hijo: &str,
    sufijo: char,
    destino: &str,
) -> EngineResult<GrupoExtraido> {
    let mut movidas = Vec::new();

    for integra in &def.integras {
        let antes = restantes.len();
        let (sacadas, quedan): (Vec<Pedido>, Vec<Pedido>) = std::mem::take(restantes)
            .into_iter()
            .partition(|l| l.integra_consecutive == *integra);
        *restantes = quedan;
        if restantes.len() == antes {
            return Err(validation_error(format!(
                "El consecutivo {} no pertenece al despacho",
                integra
            )));
        }
        for mut line in sacadas {
            line.vehicle_consecutive = vehiculo_hijo.to_string();
            line.integra_consecutive = con_sufijo(&line.integra_consecutive, sufijo);
            line.order_consecutive = con_sufijo(&line.order_consecutive, sufijo);
            line.destination = destino.to_string();
            movidas.push(line);
        }
    }

    let mut clones = Vec::new();
    if let Some(ks) = &def.kilo_split {
        let clone = pelar_kilos(restantes, ks, vehiculo_hijo, sufijo, destino)?;
        clones.push(clone);
    }

    if movidas.is_empty() && clones.is_empty() {
        return Err(validation_error(format!(
            "El grupo {} de la división está vacío",
            sufijo
        )));
    }

    Ok(GrupoExtraido { movidas, clones })
}

/// Divide una línea por kilos: el clon se lleva `k` kilos SICETAC al
/// vehículo hijo y el remanente queda en la línea original
fn pelar_kilos(
    restantes: &mut [Pedido],
    ks: &KiloSplit,
    vehiculo_hijo: &str,
    sufijo: char,
    destino: &str,
) -> EngineResult<Pedido> {
    let candidatas: Vec<usize> = restantes
        .iter()
        .enumerate()
        .filter(|(_, l)| l.integra_consecutive == ks.integra_consecutive)
        .map(|(i, _)| i)
        .collect();

    let indice = match (candidatas.len(), ks.line_id) {
        (0, _) => {
            return Err(validation_error(format!(
                "El consecutivo {} no pertenece al despacho",
                ks.integra_consecutive
            )))
        }
        (1, _) => candidatas[0],
        (_, Some(id)) => *candidatas
            .iter()
            .find(|&&i| restantes[i].id == id)
            .ok_or_else(|| {
                validation_error(format!(
                    "La línea {} no corresponde al consecutivo {}",
                    id, ks.integra_consecutive
                ))
            })?,
        (_, None) => {
            return Err(validation_error(format!(
                "El consecutivo {} no es único; la división por kilos requiere la línea exacta",
                ks.integra_consecutive
            )))
        }
    };

    let linea = &mut restantes[indice];
    let total = linea.kilos_sicetac;
    if ks.kilos <= Decimal::ZERO || ks.kilos >= total {
        return Err(validation_error(format!(
            "Los kilos a dividir deben ser mayores que cero y menores que {}",
            total
        )));
    }

    let factor = ks.kilos / total;
    let kilos_clon = (linea.kilos * factor).round_dp(2);
    let flete_clon = (linea.requested_freight * factor).round_dp(2);
    let cajas_exactas = Decimal::from(linea.cajas) * factor;
    let mut cajas_clon = cajas_exactas.round().to_i64().unwrap_or(0);
    // Una fracción de caja que redondea a cero sigue siendo una caja
    if cajas_clon == 0 && cajas_exactas > Decimal::ZERO {
        cajas_clon = 1;
    }

    let mut clon = linea.clone();
    clon.id = Uuid::new_v4();
    clon.vehicle_consecutive = vehiculo_hijo.to_string();
    clon.integra_consecutive = con_sufijo(&linea.integra_consecutive, sufijo);
    clon.order_consecutive = con_sufijo(&linea.order_consecutive, sufijo);
    clon.destination = destino.to_string();
    clon.kilos = kilos_clon;
    clon.kilos_sicetac = ks.kilos;
    clon.requested_freight = flete_clon;
    clon.real_freight = flete_clon;
    clon.cajas = cajas_clon;

    // El remanente queda en la línea original
    linea.kilos -= kilos_clon;
    linea.kilos_sicetac = total - ks.kilos;
    linea.requested_freight -= flete_clon;
    linea.real_freight = linea.requested_freight;
    linea.cajas = (linea.cajas - cajas_clon).max(0);

    Ok(clon)
}
