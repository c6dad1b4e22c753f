//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos del motor de despachos:
//! pedidos, despachos, tarifas, usuarios y los formatos de entrada/salida.

pub mod auth;
pub mod bundle;
pub mod export;
pub mod ingest;
pub mod pedido;
pub mod tarifa;

pub use auth::{RequestContext, UserInfo, UserRole};
pub use bundle::{group_bundles, AuditUpdate, BundleMirrors, BundleSummary, BundleUpdate};
pub use export::{ExportRow, ExportSheet, EXPORT_SHEET_NAME};
pub use ingest::{BatchResult, IngestRow};
pub use pedido::{EstadoPedido, Pedido, TipoViaje, NA, SYSTEM_USER};
pub use tarifa::{OtrosCostos, Tarifa, TipoVehiculo};
