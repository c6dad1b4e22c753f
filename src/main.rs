use anyhow::Result;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use freight_dispatch::config::EnvironmentConfig;
use freight_dispatch::models::auth::{UserInfo, UserRole};
use freight_dispatch::models::ingest::IngestRow;
use freight_dispatch::models::tarifa::{OtrosCostos, Tarifa};
use freight_dispatch::repositories::client_repository::{Cliente, MemoryClientDirectory};
use freight_dispatch::repositories::pedido_repository::MemoryBundleStore;
use freight_dispatch::repositories::tarifa_repository::MemoryTariffStore;
use freight_dispatch::repositories::user_repository::MemoryUserDirectory;
use freight_dispatch::DispatchEngine;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = EnvironmentConfig::default();
    info!("🚚 Freight Dispatch - Motor de autorización de despachos");
    info!("========================================================");
    info!("Entorno: {}", config.environment);
    info!("Umbral de coordinador: {}%", config.umbral_coordinador);

    let engine = build_demo_engine(config).await;

    // Lote de demostración: dos pedidos del mismo vehículo
    let rows = vec![
        demo_row("10001", "RM-501", "IBAGUE", "2500", "600000"),
        demo_row("10002", "RM-502", "NEIVA", "1500", "350000"),
    ];

    match engine.ingest_batch("maria.dispatcher", rows).await {
        Ok(result) => {
            info!(
                "✅ Lote aceptado: {} líneas en {} despacho(s), {} preautorizado(s)",
                result.line_count, result.bundle_count, result.preauthorized
            );
            for vehiculo in &result.vehicle_consecutives {
                info!("   despacho creado: {}", vehiculo);
            }
        }
        Err(e) => {
            error!("❌ Lote rechazado: {}", e);
            error!("{}", serde_json::to_string_pretty(&e.to_payload())?);
            return Ok(());
        }
    }

    let bundles = engine.list_bundles("maria.dispatcher").await?;
    for bundle in &bundles {
        info!(
            "📦 {} [{}] {} -> {} | líneas: {} | teórico: {} | solicitado: {} ({}%)",
            bundle.vehicle_consecutive,
            bundle.state,
            bundle.origin,
            bundle.destination,
            bundle.line_count,
            bundle.theoretical_cost_vehicle,
            bundle.total_vehicle_freight,
            bundle.percent_over_theoretical
        );
    }

    let stats = engine.tarifas.stats().await;
    info!(
        "📊 Cache de tarifas: {} aciertos, {} fallos",
        stats.hits, stats.misses
    );

    Ok(())
}

/// Motor de demostración sobre almacenes en memoria
async fn build_demo_engine(config: EnvironmentConfig) -> DispatchEngine {
    let store = Arc::new(MemoryBundleStore::new());
    let tarifas = Arc::new(MemoryTariffStore::new());
    let clientes = Arc::new(MemoryClientDirectory::new());
    let usuarios = Arc::new(MemoryUserDirectory::new());

    let mut base = HashMap::new();
    base.insert("TURBO".to_string(), Decimal::from(1_000_000));
    base.insert("NIES".to_string(), Decimal::from(1_400_000));
    tarifas
        .insert_tarifa(Tarifa {
            origen: "CALI".into(),
            destino: "BOGOTA".into(),
            base,
            paga_cargue_descargue: true,
            equivalencia_centro_costo: "CC-01".into(),
        })
        .await;
    for tipo in ["TURBO", "NIES"] {
        tarifas
            .insert_otros_costos(OtrosCostos {
                tipo_vehiculo: tipo.into(),
                valor_punto_adicional: Decimal::from(70_000),
                valor_cargue_descargue: Decimal::from(100_000),
            })
            .await;
    }

    clientes
        .insert(Cliente {
            nit: "800100200".into(),
            razon_social: "Distribuciones La Sabana SAS".into(),
        })
        .await;

    for (username, role, region) in [
        ("maria.dispatcher", UserRole::Dispatcher, "FUNZA"),
        ("carlos.coordinador", UserRole::Coordinator, "FUNZA"),
        ("lucia.control", UserRole::Control, "FUNZA"),
    ] {
        usuarios.insert(UserInfo::new(username, role, region)).await;
    }

    DispatchEngine::new(store, tarifas, clientes, usuarios, config)
}

fn demo_row(order: &str, tracking: &str, real_destination: &str, kilos: &str, freight: &str) -> IngestRow {
    IngestRow {
        nit_client: "800100200".into(),
        origin: "CALI".into(),
        destination: "BOGOTA".into(),
        real_destination: real_destination.into(),
        num_cajas: "20".into(),
        num_kilos: kilos.into(),
        vehicle_type: "TURBO".into(),
        vehicle_plate: "ABC123".into(),
        declared_value: "5000000".into(),
        tracking_document: tracking.into(),
        requested_freight: freight.into(),
        load_location: "CALI".into(),
        load_address: "CL 15 # 30-42".into(),
        unload_location: real_destination.into(),
        unload_address: "KM 2 VIA PRINCIPAL".into(),
        trip_type: "BULK".into(),
        order_consecutive: order.into(),
        ..Default::default()
    }
}
