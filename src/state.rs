//! Estado compartido del motor
//!
//! Este módulo arma el motor completo sobre sus colaboradores: almacén de
//! despachos, tarifas con cache, directorios de clientes y usuarios,
//! candados por vehículo y configuración. La fachada `DispatchEngine`
//! expone las operaciones del motor resolviendo el usuario y el tiempo
//! límite de cada solicitud.

use std::sync::Arc;
use tokio::time::{Duration, Instant};

use crate::cache::TarifaCache;
use crate::config::EnvironmentConfig;
use crate::models::auth::RequestContext;
use crate::models::bundle::BundleSummary;
use crate::models::export::ExportSheet;
use crate::models::ingest::{BatchResult, IngestRow};
use crate::repositories::client_repository::ClientDirectory;
use crate::repositories::pedido_repository::BundleStore;
use crate::repositories::tarifa_repository::TariffStore;
use crate::repositories::user_repository::UserDirectory;
use crate::services::{
    AdjustRequest, AdjustService, AuthorizationService, ExportService, IngestService,
    MergeRequest, MergeService, PedidoNumberOutcome, SplitOutcome, SplitRequest, SplitService,
};
use crate::utils::errors::EngineResult;
use crate::utils::locks::BundleLocks;

/// Motor de autorización de despachos armado sobre sus colaboradores
pub struct DispatchEngine {
    users: Arc<dyn UserDirectory>,
    config: EnvironmentConfig,
    pub tarifas: Arc<TarifaCache>,
    ingest: IngestService,
    authorization: AuthorizationService,
    adjust: AdjustService,
    merge: MergeService,
    split: SplitService,
    export: ExportService,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn BundleStore>,
        tariff_store: Arc<dyn TariffStore>,
        clients: Arc<dyn ClientDirectory>,
        users: Arc<dyn UserDirectory>,
        config: EnvironmentConfig,
    ) -> Self {
        let tarifas = Arc::new(TarifaCache::new(
            tariff_store,
            config.tarifa_cache_ttl,
            config.tarifa_cache_max,
        ));
        let locks = Arc::new(BundleLocks::new());

        Self {
            users,
            config: config.clone(),
            tarifas: tarifas.clone(),
            ingest: IngestService::new(
                store.clone(),
                clients,
                tarifas.clone(),
                config.clone(),
            ),
            authorization: AuthorizationService::new(store.clone(), locks.clone()),
            adjust: AdjustService::new(
                store.clone(),
                tarifas.clone(),
                locks.clone(),
                config.clone(),
            ),
            merge: MergeService::new(
                store.clone(),
                tarifas.clone(),
                locks.clone(),
                config.clone(),
            ),
            split: SplitService::new(store.clone(), tarifas.clone(), locks, config),
            export: ExportService::new(store, tarifas),
        }
    }

    /// Resuelve el usuario y arma el contexto de la solicitud con su
    /// tiempo límite
    pub async fn context_for(&self, username: &str) -> EngineResult<RequestContext> {
        let user = self.users.find(username).await?;
        let deadline = Instant::now() + Duration::from_millis(self.config.request_timeout_ms);
        Ok(RequestContext::new(user).with_deadline(deadline))
    }

    pub async fn ingest_batch(
        &self,
        username: &str,
        rows: Vec<IngestRow>,
    ) -> EngineResult<BatchResult> {
        let ctx = self.context_for(username).await?;
        self.ingest.ingest_batch(&ctx, rows).await
    }

    pub async fn authorize(
        &self,
        username: &str,
        vehicle_consecutive: &str,
        observations: &str,
    ) -> EngineResult<()> {
        let ctx = self.context_for(username).await?;
        self.authorization
            .authorize(&ctx, vehicle_consecutive, observations)
            .await
    }

    pub async fn confirm_preauthorized(
        &self,
        username: &str,
        vehicle_consecutive: &str,
    ) -> EngineResult<()> {
        let ctx = self.context_for(username).await?;
        self.authorization
            .confirm_preauthorized(&ctx, vehicle_consecutive)
            .await
    }

    pub async fn load_pedido_numbers(
        &self,
        username: &str,
        pairs: &[(String, String)],
    ) -> EngineResult<Vec<PedidoNumberOutcome>> {
        let ctx = self.context_for(username).await?;
        self.authorization.load_pedido_numbers(&ctx, pairs).await
    }

    pub async fn delete_bundle(
        &self,
        username: &str,
        vehicle_consecutive: &str,
    ) -> EngineResult<u64> {
        let ctx = self.context_for(username).await?;
        self.authorization.delete_bundle(&ctx, vehicle_consecutive).await
    }

    pub async fn list_bundles(&self, username: &str) -> EngineResult<Vec<BundleSummary>> {
        let ctx = self.context_for(username).await?;
        self.authorization.list_bundles(&ctx).await
    }

    pub async fn adjust(&self, username: &str, req: &AdjustRequest) -> EngineResult<()> {
        let ctx = self.context_for(username).await?;
        self.adjust.adjust(&ctx, req).await
    }

    pub async fn merge(&self, username: &str, req: &MergeRequest) -> EngineResult<String> {
        let ctx = self.context_for(username).await?;
        self.merge.merge(&ctx, req).await
    }

    pub async fn split(&self, username: &str, req: &SplitRequest) -> EngineResult<SplitOutcome> {
        let ctx = self.context_for(username).await?;
        self.split.split(&ctx, req).await
    }

    pub async fn export(&self, username: &str) -> EngineResult<ExportSheet> {
        // El contexto valida que el usuario exista antes de exportar
        let _ctx = self.context_for(username).await?;
        self.export.export().await
    }
}
