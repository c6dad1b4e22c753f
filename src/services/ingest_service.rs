//! Normalizador de ingesta
//!
//! Recibe el lote de filas ya normalizado por el cargador de hojas,
//! valida fila por fila, agrupa por placa en despachos, clasifica cada
//! despacho con el núcleo de tarificación y escribe todo el lote de una
//! sola vez. Si cualquier fila falla, no se inserta ninguna: los errores
//! se devuelven indexados por fila para que el operador corrija la hoja.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::TarifaCache;
use crate::config::EnvironmentConfig;
use crate::models::auth::RequestContext;
use crate::models::ingest::{BatchResult, IngestRow};
use crate::models::pedido::{EstadoPedido, Pedido, TipoViaje, NA, SYSTEM_USER};
use crate::repositories::client_repository::ClientDirectory;
use crate::repositories::pedido_repository::BundleStore;
use crate::services::access_policy::{self, Capability};
use crate::services::pricing::{self, CostOverrides};
use crate::utils::city::city_key;
use crate::utils::consecutivos;
use crate::utils::errors::{EngineError, EngineResult, ErrorFila};
use crate::utils::validation::{
    campo_requerido, parse_decimal_no_negativo, parse_decimal_opcional, parse_entero,
};
use uuid::Uuid;
use validator::Validate;

/// Acumulado de un despacho (placa) dentro del lote. Es estado por lote,
/// nunca global al proceso.
struct PlateGroup {
    vehicle_consecutive: String,
    vehicle_type: String,
    destination_key: String,
    orders_seen: Vec<String>,
    lines: Vec<Pedido>,
}

/// Servicio de ingesta de lotes
pub struct IngestService {
    store: Arc<dyn BundleStore>,
    clients: Arc<dyn ClientDirectory>,
    tarifas: Arc<TarifaCache>,
    config: EnvironmentConfig,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn BundleStore>,
        clients: Arc<dyn ClientDirectory>,
        tarifas: Arc<TarifaCache>,
        config: EnvironmentConfig,
    ) -> Self {
        Self {
            store,
            clients,
            tarifas,
            config,
        }
    }

    /// Ingesta un lote completo; todo o nada
    pub async fn ingest_batch(
        &self,
        ctx: &RequestContext,
        rows: Vec<IngestRow>,
    ) -> EngineResult<BatchResult> {
        access_policy::check(&ctx.user, Capability::IngestBatch, &ctx.user.region)?;

        if rows.is_empty() {
            return Err(EngineError::Validacion(
                "El lote no contiene filas".to_string(),
            ));
        }

        let region = ctx.user.region.clone();
        let fecha = ctx.now;
        let mut errores: Vec<ErrorFila> = Vec::new();
        let mut grupos: HashMap<String, PlateGroup> = HashMap::new();
        let mut orden_de_placas: Vec<String> = Vec::new();

        for (idx, row) in rows.iter().enumerate() {
            // Las filas de datos empiezan en la 2; la 1 es el encabezado
            let fila = idx + 2;
            match self
                .validate_row(fila, row, &region, &ctx.user.username, fecha, &mut grupos)
                .await
            {
                Ok(pedido) => {
                    let placa = pedido.vehicle_plate.clone();
                    if !orden_de_placas.contains(&placa) {
                        orden_de_placas.push(placa.clone());
                    }
                    let grupo = grupos.get_mut(&placa).expect("grupo creado en validación");
                    grupo.lines.push(pedido);
                }
                Err(mut errs) => errores.append(&mut errs),
            }
        }

        if !errores.is_empty() {
            warn!(
                filas_con_error = errores.len(),
                usuario = %ctx.user.username,
                "lote de ingesta rechazado"
            );
            return Err(EngineError::LoteInvalido(errores));
        }

        // Clasificación por despacho y espejos de alcance de vehículo
        let mut todas: Vec<Pedido> = Vec::new();
        let mut vehicle_consecutives = Vec::new();
        let mut preauthorized = 0usize;

        for placa in &orden_de_placas {
            let grupo = grupos.remove(placa).expect("grupo por placa");
            let mut lines = grupo.lines;

            let billing_type = lines[0].billing_vehicle_type().to_string();
            let tarifa = self
                .tarifas
                .tariff(&lines[0].origin, &lines[0].destination)
                .await?;
            let otros = self.tarifas.other_costs(&billing_type).await?;

            let classification = pricing::classify(
                &lines,
                &CostOverrides::none(),
                &billing_type,
                &tarifa,
                &otros,
                self.config.umbral_coordinador,
            )?;
            let mirrors = pricing::build_mirrors(&lines, &classification, None);

            let (authorized_by, authorization_ts) =
                if classification.state == EstadoPedido::Preauthorized {
                    preauthorized += 1;
                    (SYSTEM_USER.to_string(), fecha.to_rfc3339())
                } else {
                    (NA.to_string(), NA.to_string())
                };

            for line in &mut lines {
                mirrors.apply(line);
                line.state = classification.state;
                line.authorized_by = authorized_by.clone();
                line.authorization_ts = authorization_ts.clone();
            }

            vehicle_consecutives.push(grupo.vehicle_consecutive.clone());
            todas.extend(lines);
        }

        ctx.check_deadline()?;

        let line_count = todas.len();
        let bundle_count = vehicle_consecutives.len();
        self.store.insert_lines(todas).await?;

        info!(
            lineas = line_count,
            despachos = bundle_count,
            preautorizados = preauthorized,
            usuario = %ctx.user.username,
            "lote de ingesta aceptado"
        );

        Ok(BatchResult {
            line_count,
            bundle_count,
            vehicle_consecutives,
            preauthorized,
        })
    }

    /// Valida una fila y la convierte en pedido. Acumula todos los errores
    /// de la fila en vez de detenerse en el primero.
    async fn validate_row(
        &self,
        fila: usize,
        row: &IngestRow,
        region: &str,
        usuario: &str,
        fecha: DateTime<Utc>,
        grupos: &mut HashMap<String, PlateGroup>,
    ) -> Result<Pedido, Vec<ErrorFila>> {
        let mut errores: Vec<ErrorFila> = Vec::new();

        if let Err(invalidos) = row.validate() {
            for campo in invalidos.field_errors().keys() {
                errores.push(ErrorFila::new(
                    fila,
                    Some(*campo),
                    format!("El campo {campo} no cumple la longitud permitida"),
                ));
            }
        }

        macro_rules! requerido {
            ($campo:literal, $valor:expr) => {
                match campo_requerido(fila, $campo, $valor) {
                    Ok(v) => v,
                    Err(e) => {
                        errores.push(e);
                        String::new()
                    }
                }
            };
        }
        macro_rules! decimal {
            ($campo:literal, $valor:expr) => {
                match parse_decimal_no_negativo(fila, $campo, $valor) {
                    Ok(v) => v,
                    Err(e) => {
                        errores.push(e);
                        Decimal::ZERO
                    }
                }
            };
        }
        macro_rules! decimal_opcional {
            ($campo:literal, $valor:expr) => {
                match parse_decimal_opcional(fila, $campo, $valor) {
                    Ok(v) => v.unwrap_or(Decimal::ZERO),
                    Err(e) => {
                        errores.push(e);
                        Decimal::ZERO
                    }
                }
            };
        }

        let nit_client = requerido!("NIT_CLIENT", &row.nit_client);
        let origin = requerido!("ORIGIN", &row.origin);
        let destination = requerido!("DESTINATION", &row.destination);
        let vehicle_type = requerido!("VEHICLE_TYPE", &row.vehicle_type).to_uppercase();
        let vehicle_plate = requerido!("VEHICLE_PLATE", &row.vehicle_plate)
            .to_uppercase()
            .replace('-', "");
        let order_consecutive = requerido!("ORDER_CONSECUTIVE", &row.order_consecutive);
        let load_location = requerido!("LOAD_LOCATION", &row.load_location);
        let unload_location = requerido!("UNLOAD_LOCATION", &row.unload_location);
        let tracking_document = requerido!("TRACKING_DOCUMENT", &row.tracking_document);

        if !vehicle_plate.is_empty() {
            if let Err(e) = consecutivos::validar_placa(&vehicle_plate) {
                errores.push(ErrorFila::new(fila, Some("VEHICLE_PLATE"), e.to_string()));
            }
        }

        let cajas = match parse_entero(fila, "NUM_CAJAS", &row.num_cajas) {
            Ok(v) => v,
            Err(e) => {
                errores.push(e);
                0
            }
        };
        let kilos = decimal!("NUM_KILOS", &row.num_kilos);
        let kilos_sicetac = match parse_decimal_opcional(fila, "NUM_KILOS_SICETAC", &row.num_kilos_sicetac)
        {
            Ok(v) => v.unwrap_or(kilos),
            Err(e) => {
                errores.push(e);
                kilos
            }
        };
        let declared_value = decimal!("DECLARED_VALUE", &row.declared_value);
        let requested_freight = decimal!("REQUESTED_FREIGHT", &row.requested_freight);
        let real_freight = match parse_decimal_opcional(fila, "REAL_FREIGHT", &row.real_freight) {
            Ok(v) => v.unwrap_or(requested_freight),
            Err(e) => {
                errores.push(e);
                requested_freight
            }
        };
        let detour = decimal_opcional!("DETOUR", &row.detour);
        let load_unload = decimal_opcional!("LOAD_UNLOAD", &row.load_unload);
        let load_unload_kabi = decimal_opcional!("LOAD_UNLOAD_KABI", &row.load_unload_kabi);
        let extra_point = decimal_opcional!("EXTRA_POINT", &row.extra_point);
        let total_points = decimal_opcional!("TOTAL_POINTS", &row.total_points);
        let insurance = decimal_opcional!("INSURANCE", &row.insurance);

        let trip_type = match TipoViaje::from_str(&row.trip_type) {
            Some(t) => t,
            None => {
                errores.push(ErrorFila::new(
                    fila,
                    Some("TRIP_TYPE"),
                    format!(
                        "El tipo de viaje '{}' no es válido; use BULK o PARCEL",
                        row.trip_type
                    ),
                ));
                TipoViaje::Bulk
            }
        };

        // Cliente y tarifa existen; consultas que fallan cerradas
        if !nit_client.is_empty() {
            match self.clients.exists(&nit_client).await {
                Ok(true) => {}
                Ok(false) => errores.push(ErrorFila::new(
                    fila,
                    Some("NIT_CLIENT"),
                    format!("El cliente con NIT {} no existe", nit_client),
                )),
                Err(e) => errores.push(ErrorFila::new(fila, Some("NIT_CLIENT"), e.to_string())),
            }
        }

        let vehicle_type_sicetac = {
            let limpio = row.vehicle_type_sicetac.trim().to_uppercase();
            if limpio.is_empty() {
                None
            } else {
                Some(limpio)
            }
        };
        let billing_type = vehicle_type_sicetac
            .clone()
            .unwrap_or_else(|| vehicle_type.clone());

        if !origin.is_empty() && !destination.is_empty() && !billing_type.is_empty() {
            match self.tarifas.tariff(&origin, &destination).await {
                Ok(tarifa) => {
                    if tarifa.base_para(&billing_type).is_none() {
                        errores.push(ErrorFila::new(
                            fila,
                            Some("VEHICLE_TYPE"),
                            format!(
                                "No existe tarifa de {} -> {} para el tipo {}",
                                origin, destination, billing_type
                            ),
                        ));
                    }
                    if self.tarifas.other_costs(&billing_type).await.is_err() {
                        errores.push(ErrorFila::new(
                            fila,
                            Some("VEHICLE_TYPE"),
                            format!("No existen otros costos para el tipo {}", billing_type),
                        ));
                    }
                }
                Err(e) => errores.push(ErrorFila::new(fila, Some("DESTINATION"), e.to_string())),
            }
        }

        // Consecutivos y duplicados contra el almacén activo
        let integra_consecutive =
            consecutivos::consecutivo_integra(region, fecha, &order_consecutive);
        let vehicle_consecutive =
            consecutivos::consecutivo_vehiculo(region, fecha, &vehicle_plate);

        if !order_consecutive.is_empty() {
            match self.store.integra_active_exists(&integra_consecutive).await {
                Ok(true) => errores.push(ErrorFila::new(
                    fila,
                    Some("ORDER_CONSECUTIVE"),
                    format!(
                        "El consecutivo {} ya existe en los despachos activos",
                        integra_consecutive
                    ),
                )),
                Ok(false) => {}
                Err(e) => errores.push(ErrorFila::new(
                    fila,
                    Some("ORDER_CONSECUTIVE"),
                    e.to_string(),
                )),
            }
        }

        // Consistencia entre filas de la misma placa
        if !vehicle_plate.is_empty() {
            let grupo = grupos.entry(vehicle_plate.clone()).or_insert_with(|| PlateGroup {
                vehicle_consecutive: vehicle_consecutive.clone(),
                vehicle_type: vehicle_type.clone(),
                destination_key: city_key(&destination),
                orders_seen: Vec::new(),
                lines: Vec::new(),
            });

            if grupo.vehicle_type != vehicle_type {
                errores.push(ErrorFila::new(
                    fila,
                    Some("VEHICLE_TYPE"),
                    format!(
                        "La placa {} tiene filas con tipos de vehículo distintos ({} y {})",
                        vehicle_plate, grupo.vehicle_type, vehicle_type
                    ),
                ));
            }
            if grupo.destination_key != city_key(&destination) {
                errores.push(ErrorFila::new(
                    fila,
                    Some("DESTINATION"),
                    format!(
                        "La placa {} tiene filas con destinos distintos",
                        vehicle_plate
                    ),
                ));
            }
            if grupo.orders_seen.contains(&order_consecutive) {
                errores.push(ErrorFila::new(
                    fila,
                    Some("ORDER_CONSECUTIVE"),
                    format!(
                        "El consecutivo de pedido {} está repetido para la placa {}",
                        order_consecutive, vehicle_plate
                    ),
                ));
            } else {
                grupo.orders_seen.push(order_consecutive.clone());
            }
        }

        if !errores.is_empty() {
            return Err(errores);
        }

        Ok(Pedido {
            id: Uuid::new_v4(),
            order_consecutive,
            integra_consecutive,
            vehicle_consecutive,
            pedido_number: None,
            client_nit: nit_client,
            origin,
            destination,
            real_destination: row.real_destination.trim().to_string(),
            load_location,
            load_address: row.load_address.trim().to_string(),
            unload_location,
            unload_address: row.unload_address.trim().to_string(),
            observations: row.observations.trim().to_string(),
            tracking_document,
            cajas,
            kilos,
            kilos_sicetac,
            declared_value,
            insurance,
            vehicle_plate,
            vehicle_type,
            vehicle_type_sicetac,
            trip_type,
            requested_freight,
            real_freight,
            detour,
            load_unload,
            load_unload_kabi,
            extra_point,
            total_points,
            total_cajas_vehicle: 0,
            total_kilos_vehicle: Decimal::ZERO,
            total_kilos_vehicle_sicetac: Decimal::ZERO,
            total_points_vehicle: 0,
            system_freight: Decimal::ZERO,
            theoretical_extra_point: Decimal::ZERO,
            theoretical_load_unload: Decimal::ZERO,
            theoretical_cost_vehicle: Decimal::ZERO,
            total_requested_freight: Decimal::ZERO,
            total_load_unload: Decimal::ZERO,
            total_extra_point: Decimal::ZERO,
            total_detour_vehicle: Decimal::ZERO,
            total_vehicle_freight: Decimal::ZERO,
            freight_difference: Decimal::ZERO,
            percent_over_theoretical: Decimal::ZERO,
            state: EstadoPedido::RequiresControl,
            authorized_by: NA.to_string(),
            authorization_ts: NA.to_string(),
            approver_observations: String::new(),
            adjustment_observations: String::new(),
            region: region.to_string(),
            created_by: usuario.to_string(),
            created_at: fecha,
            usuario_ajusta_destino: None,
            fecha_ajusta_destino: None,
            usuario_fusion: None,
            fecha_fusion: None,
            observacion_fusion: None,
            usuario_division: None,
            fecha_division: None,
            observacion_division: None,
            pedido_actualizado_vulcano_por: None,
            fecha_actualizacion_vulcano: None,
        })
    }
}
