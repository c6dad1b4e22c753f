//! Núcleo de tarificación
//!
//! Funciones puras que calculan el costo teórico y el costo solicitado de
//! un despacho y derivan su estado de autorización. El núcleo nunca hace
//! I/O: las tarifas y otros costos llegan ya resueltos por el llamador,
//! lo que mantiene las pruebas de propiedades deterministas.

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::bundle::BundleMirrors;
use crate::models::pedido::{EstadoPedido, Pedido};
use crate::models::tarifa::{OtrosCostos, Tarifa};
use crate::utils::city::city_key;
use crate::utils::errors::{EngineError, EngineResult};

/// Sobrescrituras del costo solicitado. Cuando un componente viene, ese
/// valor reemplaza la suma de las líneas; cuando no, se suma línea a línea.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostOverrides {
    pub freight: Option<Decimal>,
    pub load_unload: Option<Decimal>,
    pub extra_point: Option<Decimal>,
    pub detour: Option<Decimal>,
}

impl CostOverrides {
    pub fn none() -> Self {
        Self::default()
    }

    /// Cuarteto completo, obligatorio en fusiones
    pub fn all(
        freight: Decimal,
        load_unload: Decimal,
        extra_point: Decimal,
        detour: Decimal,
    ) -> Self {
        Self {
            freight: Some(freight),
            load_unload: Some(load_unload),
            extra_point: Some(extra_point),
            detour: Some(detour),
        }
    }
}

/// Resultado de clasificar un despacho
#[derive(Debug, Clone)]
pub struct Classification {
    pub billing_vehicle_type: String,
    /// Tarifa base del par origen-destino para el tipo facturado
    pub base: Decimal,
    pub points: u32,
    pub theoretical_extra_point: Decimal,
    pub theoretical_load_unload: Decimal,
    pub theoretical: Decimal,
    /// Componentes efectivos del costo solicitado (sobrescritura o suma)
    pub requested_freight: Decimal,
    pub load_unload: Decimal,
    pub extra_point: Decimal,
    pub detour: Decimal,
    pub load_unload_kabi: Decimal,
    pub requested: Decimal,
    pub state: EstadoPedido,
    /// Porcentaje sobre el teórico, redondeado a 2 decimales y nunca negativo
    pub percent: Decimal,
}

/// Puntos de entrega de un despacho: el mayor entre los destinos reales
/// distintos y la suma de puntos digitados, con mínimo 1
pub fn delivery_points(lines: &[Pedido]) -> u32 {
    let distintos: HashSet<String> = lines
        .iter()
        .map(|l| city_key(&l.real_destination))
        .filter(|k| !k.is_empty())
        .collect();
    let suma: Decimal = lines.iter().map(|l| l.total_points).sum();

    let distintos = distintos.len() as u32;
    let suma = suma.to_u32().unwrap_or(0);
    distintos.max(suma).max(1)
}

/// Clasifica un despacho: costo teórico, costo solicitado, estado y
/// porcentaje sobre el teórico.
///
/// `umbral_coordinador` es el porcentaje hasta el cual autoriza un
/// coordinador (7.0 en producción); por encima autoriza control.
pub fn classify(
    lines: &[Pedido],
    overrides: &CostOverrides,
    billing_vehicle_type: &str,
    tarifa: &Tarifa,
    otros_costos: &OtrosCostos,
    umbral_coordinador: Decimal,
) -> EngineResult<Classification> {
    let base = tarifa.base_para(billing_vehicle_type).ok_or_else(|| {
        EngineError::TarifaSinTipoVehiculo {
            origen: tarifa.origen.clone(),
            destino: tarifa.destino.clone(),
            tipo_vehiculo: billing_vehicle_type.to_string(),
        }
    })?;

    let points = delivery_points(lines);
    let extra_points = Decimal::from(points.saturating_sub(1));
    let theoretical_extra_point = extra_points * otros_costos.valor_punto_adicional;
    let theoretical_load_unload = if tarifa.paga_cargue_descargue {
        otros_costos.valor_cargue_descargue
    } else {
        Decimal::ZERO
    };
    let theoretical = base + theoretical_extra_point + theoretical_load_unload;

    let sum = |f: fn(&Pedido) -> Decimal| -> Decimal { lines.iter().map(f).sum() };
    let requested_freight = overrides
        .freight
        .unwrap_or_else(|| sum(|l| l.requested_freight));
    let load_unload = overrides
        .load_unload
        .unwrap_or_else(|| sum(|l| l.load_unload));
    let extra_point = overrides
        .extra_point
        .unwrap_or_else(|| sum(|l| l.extra_point));
    let detour = overrides.detour.unwrap_or_else(|| sum(|l| l.detour));
    let load_unload_kabi = sum(|l| l.load_unload_kabi);

    let requested =
        requested_freight + detour + extra_point + load_unload.max(load_unload_kabi);

    let (state, percent) = decide_state(theoretical, requested, umbral_coordinador);

    Ok(Classification {
        billing_vehicle_type: billing_vehicle_type.trim().to_uppercase(),
        base,
        points,
        theoretical_extra_point,
        theoretical_load_unload,
        theoretical,
        requested_freight,
        load_unload,
        extra_point,
        detour,
        load_unload_kabi,
        requested,
        state,
        percent,
    })
}

/// Decide el estado de autorización y el porcentaje sobre el teórico
fn decide_state(
    theoretical: Decimal,
    requested: Decimal,
    umbral_coordinador: Decimal,
) -> (EstadoPedido, Decimal) {
    if theoretical <= Decimal::ZERO {
        return (EstadoPedido::RequiresControl, Decimal::ZERO);
    }

    let cien = Decimal::from(100);
    let percent = (requested - theoretical) / theoretical * cien;

    if requested <= theoretical {
        (EstadoPedido::Preauthorized, percent.max(Decimal::ZERO).round_dp(2))
    } else if percent <= umbral_coordinador {
        (EstadoPedido::RequiresCoordinator, percent.round_dp(2))
    } else {
        (EstadoPedido::RequiresControl, percent.round_dp(2))
    }
}

/// Construye los espejos de alcance de vehículo a partir de una
/// clasificación. `kilos_sicetac_override` reemplaza la suma de kilos
/// SICETAC cuando el operador corrige el total en un ajuste.
pub fn build_mirrors(
    lines: &[Pedido],
    classification: &Classification,
    kilos_sicetac_override: Option<Decimal>,
) -> BundleMirrors {
    let total_kilos_sicetac = kilos_sicetac_override
        .unwrap_or_else(|| lines.iter().map(|l| l.kilos_sicetac).sum());

    BundleMirrors {
        total_cajas_vehicle: lines.iter().map(|l| l.cajas).sum(),
        total_kilos_vehicle: lines.iter().map(|l| l.kilos).sum(),
        total_kilos_vehicle_sicetac: total_kilos_sicetac,
        total_points_vehicle: classification.points,
        system_freight: classification.base,
        theoretical_extra_point: classification.theoretical_extra_point,
        theoretical_load_unload: classification.theoretical_load_unload,
        theoretical_cost_vehicle: classification.theoretical,
        total_requested_freight: classification.requested_freight,
        total_load_unload: classification.load_unload,
        total_extra_point: classification.extra_point,
        total_detour_vehicle: classification.detour,
        total_vehicle_freight: classification.requested,
        freight_difference: classification.requested - classification.theoretical,
        percent_over_theoretical: classification.percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pedido::pedido_de_prueba;
    use std::collections::HashMap;
    use std::str::FromStr;

    fn tarifa_cali_bogota() -> Tarifa {
        let mut base = HashMap::new();
        base.insert("TURBO".to_string(), Decimal::from(1_000_000));
        Tarifa {
            origen: "CALI".into(),
            destino: "BOGOTA".into(),
            base,
            paga_cargue_descargue: true,
            equivalencia_centro_costo: "CC-01".into(),
        }
    }

    fn otros_costos_turbo() -> OtrosCostos {
        OtrosCostos {
            tipo_vehiculo: "TURBO".into(),
            valor_punto_adicional: Decimal::from(70_000),
            valor_cargue_descargue: Decimal::from(100_000),
        }
    }

    fn umbral() -> Decimal {
        Decimal::from_str("7.0").unwrap()
    }

    #[test]
    fn test_camino_preautorizado() {
        let lines = vec![pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000)];
        let c = classify(
            &lines,
            &CostOverrides::none(),
            "TURBO",
            &tarifa_cali_bogota(),
            &otros_costos_turbo(),
            umbral(),
        )
        .unwrap();

        assert_eq!(c.theoretical, Decimal::from(1_100_000));
        assert_eq!(c.requested, Decimal::from(900_000));
        assert_eq!(c.state, EstadoPedido::Preauthorized);
        assert_eq!(c.percent, Decimal::ZERO);
    }

    #[test]
    fn test_camino_coordinador() {
        let lines = vec![pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 1_150_000)];
        let c = classify(
            &lines,
            &CostOverrides::none(),
            "TURBO",
            &tarifa_cali_bogota(),
            &otros_costos_turbo(),
            umbral(),
        )
        .unwrap();

        assert_eq!(c.state, EstadoPedido::RequiresCoordinator);
        assert_eq!(c.percent, Decimal::from_str("4.55").unwrap());
    }

    #[test]
    fn test_camino_control() {
        let lines = vec![pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 1_300_000)];
        let c = classify(
            &lines,
            &CostOverrides::none(),
            "TURBO",
            &tarifa_cali_bogota(),
            &otros_costos_turbo(),
            umbral(),
        )
        .unwrap();

        assert_eq!(c.state, EstadoPedido::RequiresControl);
        assert_eq!(c.percent, Decimal::from_str("18.18").unwrap());
    }

    #[test]
    fn test_teorico_no_positivo_requiere_control() {
        let mut tarifa = tarifa_cali_bogota();
        tarifa.base.insert("TURBO".to_string(), Decimal::from(-100_000));
        tarifa.paga_cargue_descargue = false;
        let lines = vec![pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000)];
        let c = classify(
            &lines,
            &CostOverrides::none(),
            "TURBO",
            &tarifa,
            &otros_costos_turbo(),
            umbral(),
        )
        .unwrap();

        assert_eq!(c.state, EstadoPedido::RequiresControl);
        assert_eq!(c.percent, Decimal::ZERO);
    }

    #[test]
    fn test_puntos_por_destinos_reales() {
        let lines = vec![
            pedido_de_prueba("V1", "I1", "IBAGUE", 1000, 300_000),
            pedido_de_prueba("V1", "I2", "NEIVA", 1000, 300_000),
            pedido_de_prueba("V1", "I3", "PITALITO", 1000, 300_000),
        ];
        let c = classify(
            &lines,
            &CostOverrides::none(),
            "TURBO",
            &tarifa_cali_bogota(),
            &otros_costos_turbo(),
            umbral(),
        )
        .unwrap();

        assert_eq!(c.points, 3);
        assert_eq!(c.theoretical_extra_point, Decimal::from(140_000));
    }

    #[test]
    fn test_puntos_minimo_uno() {
        let mut line = pedido_de_prueba("V1", "I1", "", 1000, 300_000);
        line.real_destination = String::new();
        assert_eq!(delivery_points(&[line]), 1);
    }

    #[test]
    fn test_kabi_gana_al_cargue_descargue() {
        let mut line = pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000);
        line.load_unload = Decimal::from(50_000);
        line.load_unload_kabi = Decimal::from(80_000);
        let c = classify(
            &[line],
            &CostOverrides::none(),
            "TURBO",
            &tarifa_cali_bogota(),
            &otros_costos_turbo(),
            umbral(),
        )
        .unwrap();

        // requested = 900000 + max(50000, 80000)
        assert_eq!(c.requested, Decimal::from(980_000));
    }

    #[test]
    fn test_overrides_reemplazan_sumas() {
        let lines = vec![
            pedido_de_prueba("V1", "I1", "BOGOTA", 1000, 400_000),
            pedido_de_prueba("V1", "I2", "BOGOTA", 1000, 400_000),
        ];
        let overrides = CostOverrides::all(
            Decimal::from(950_000),
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        );
        let c = classify(
            &lines,
            &overrides,
            "TURBO",
            &tarifa_cali_bogota(),
            &otros_costos_turbo(),
            umbral(),
        )
        .unwrap();
        assert_eq!(c.requested, Decimal::from(950_000));
    }

    #[test]
    fn test_tipo_sin_tarifa() {
        let lines = vec![pedido_de_prueba("V1", "I1", "BOGOTA", 4000, 900_000)];
        let err = classify(
            &lines,
            &CostOverrides::none(),
            "NHR",
            &tarifa_cali_bogota(),
            &otros_costos_turbo(),
            umbral(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "TARIFF_MISSING");
    }

    #[test]
    fn test_invariantes_de_espejos() {
        let lines = vec![
            pedido_de_prueba("V1", "I1", "IBAGUE", 1500, 500_000),
            pedido_de_prueba("V1", "I2", "NEIVA", 2500, 700_000),
        ];
        let c = classify(
            &lines,
            &CostOverrides::none(),
            "TURBO",
            &tarifa_cali_bogota(),
            &otros_costos_turbo(),
            umbral(),
        )
        .unwrap();
        let m = build_mirrors(&lines, &c, None);

        // I2: flete total = solicitado + desvío + punto extra + max(cd, kabi)
        assert_eq!(
            m.total_vehicle_freight,
            m.total_requested_freight
                + m.total_detour_vehicle
                + m.total_extra_point
                + m.total_load_unload.max(Decimal::ZERO)
        );
        // I3: teórico = base + punto extra teórico + cargue/descargue teórico
        assert_eq!(
            m.theoretical_cost_vehicle,
            m.system_freight + m.theoretical_extra_point + m.theoretical_load_unload
        );
        // I4: diferencia = total - teórico
        assert_eq!(
            m.freight_difference,
            m.total_vehicle_freight - m.theoretical_cost_vehicle
        );
        assert_eq!(m.total_kilos_vehicle, Decimal::from(4000));
    }
}
