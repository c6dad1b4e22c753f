//! Services module
//!
//! Este módulo contiene la lógica de negocio del motor de despachos. Los
//! servicios encapsulan operaciones completas sobre los despachos; el
//! núcleo de tarificación y la política de acceso son módulos puros que
//! los demás servicios comparten.

pub mod access_policy;
pub mod adjust_service;
pub mod authorization_service;
pub mod export_service;
pub mod ingest_service;
pub mod merge_service;
pub mod pricing;
pub mod split_service;

pub use access_policy::Capability;
pub use adjust_service::{AdjustRequest, AdjustService};
pub use authorization_service::{AuthorizationService, PedidoNumberOutcome};
pub use export_service::ExportService;
pub use ingest_service::IngestService;
pub use merge_service::{MergeRequest, MergeService};
pub use pricing::{Classification, CostOverrides};
pub use split_service::{KiloSplit, SplitGroup, SplitOutcome, SplitRequest, SplitService};
