//! Propiedades del núcleo de tarificación en sus fronteras

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use freight_dispatch::models::pedido::{EstadoPedido, Pedido, TipoViaje};
use freight_dispatch::models::tarifa::{OtrosCostos, Tarifa};
use freight_dispatch::services::pricing::{build_mirrors, classify, CostOverrides};

fn linea(requested_freight: i64) -> Pedido {
    Pedido {
        id: uuid::Uuid::new_v4(),
        order_consecutive: "10001".into(),
        integra_consecutive: "FUNZA-20240101-10001".into(),
        vehicle_consecutive: "FUNZA-20240101-ABC123".into(),
        pedido_number: None,
        client_nit: "800100200".into(),
        origin: "CALI".into(),
        destination: "BOGOTA".into(),
        real_destination: "BOGOTA".into(),
        load_location: "CALI".into(),
        load_address: "CL 1 # 2-3".into(),
        unload_location: "BOGOTA".into(),
        unload_address: "CR 4 # 5-6".into(),
        observations: String::new(),
        tracking_document: "RM-1".into(),
        cajas: 10,
        kilos: Decimal::from(4000),
        kilos_sicetac: Decimal::from(4000),
        declared_value: Decimal::from(1_000_000),
        insurance: Decimal::ZERO,
        vehicle_plate: "ABC123".into(),
        vehicle_type: "TURBO".into(),
        vehicle_type_sicetac: None,
        trip_type: TipoViaje::Bulk,
        requested_freight: Decimal::from(requested_freight),
        real_freight: Decimal::from(requested_freight),
        detour: Decimal::ZERO,
        load_unload: Decimal::ZERO,
        load_unload_kabi: Decimal::ZERO,
        extra_point: Decimal::ZERO,
        total_points: Decimal::ZERO,
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
        authorized_by: "NA".into(),
        authorization_ts: "NA".into(),
        approver_observations: String::new(),
        adjustment_observations: String::new(),
        region: "FUNZA".into(),
        created_by: "maria".into(),
        created_at: chrono::Utc::now(),
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
    }
}

fn tarifa() -> Tarifa {
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

fn otros() -> OtrosCostos {
    OtrosCostos {
        tipo_vehiculo: "TURBO".into(),
        valor_punto_adicional: Decimal::from(70_000),
        valor_cargue_descargue: Decimal::from(100_000),
    }
}

fn umbral() -> Decimal {
    Decimal::from_str("7.0").unwrap()
}

fn clasificar(requested_freight: i64) -> (EstadoPedido, Decimal) {
    let lines = vec![linea(requested_freight)];
    let c = classify(
        &lines,
        &CostOverrides::none(),
        "TURBO",
        &tarifa(),
        &otros(),
        umbral(),
    )
    .unwrap();
    (c.state, c.percent)
}

// El teórico del par de prueba es 1000000 + 100000 = 1100000

#[test]
fn igual_al_teorico_preautoriza() {
    let (state, percent) = clasificar(1_100_000);
    assert_eq!(state, EstadoPedido::Preauthorized);
    assert_eq!(percent, Decimal::ZERO);
}

#[test]
fn el_umbral_exacto_del_siete_por_ciento_es_del_coordinador() {
    // 1100000 * 1.07 = 1177000
    let (state, percent) = clasificar(1_177_000);
    assert_eq!(state, EstadoPedido::RequiresCoordinator);
    assert_eq!(percent, Decimal::from_str("7.00").unwrap());
}

#[test]
fn un_peso_sobre_el_umbral_va_a_control() {
    let (state, _) = clasificar(1_177_001);
    assert_eq!(state, EstadoPedido::RequiresControl);
}

#[test]
fn la_decision_usa_el_porcentaje_sin_redondear() {
    // 7.004%: el redondeo a 7.00 no lo devuelve al coordinador si la
    // decisión fuera sobre el valor redondeado; debe decidirse antes
    let requested = 1_100_000 + 77_047; // 7.0042...%
    let (state, percent) = clasificar(requested);
    assert_eq!(state, EstadoPedido::RequiresControl);
    assert_eq!(percent, Decimal::from_str("7.00").unwrap());
}

#[test]
fn estados_consistentes_en_un_barrido_de_fletes() {
    let teorico = Decimal::from(1_100_000);
    for requested in (900_000..1_300_000).step_by(7_919) {
        let (state, percent) = clasificar(requested);
        let requested = Decimal::from(requested);
        let exacto = (requested - teorico) / teorico * Decimal::from(100);
        match state {
            EstadoPedido::Preauthorized => assert!(requested <= teorico),
            EstadoPedido::RequiresCoordinator => {
                assert!(exacto > Decimal::ZERO && exacto <= umbral())
            }
            EstadoPedido::RequiresControl => assert!(exacto > umbral()),
            other => panic!("estado inesperado {:?}", other),
        }
        assert!(percent >= Decimal::ZERO);
    }
}

#[test]
fn los_espejos_satisfacen_las_identidades_de_costo() {
    for requested in [900_000i64, 1_100_000, 1_177_000, 1_500_000] {
        let mut lines = vec![linea(requested), linea(200_000)];
        lines[1].real_destination = "NEIVA".into();
        lines[1].load_unload_kabi = Decimal::from(40_000);
        let c = classify(
            &lines,
            &CostOverrides::none(),
            "TURBO",
            &tarifa(),
            &otros(),
            umbral(),
        )
        .unwrap();
        let m = build_mirrors(&lines, &c, None);

        assert_eq!(
            m.theoretical_cost_vehicle,
            m.system_freight + m.theoretical_extra_point + m.theoretical_load_unload
        );
        assert_eq!(
            m.total_vehicle_freight,
            m.total_requested_freight
                + m.total_detour_vehicle
                + m.total_extra_point
                + m.total_load_unload.max(Decimal::from(40_000))
        );
        assert_eq!(
            m.freight_difference,
            m.total_vehicle_freight - m.theoretical_cost_vehicle
        );
        assert_eq!(m.total_points_vehicle, 2);
    }
}
