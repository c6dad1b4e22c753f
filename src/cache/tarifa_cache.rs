//! Cache de tarifas y otros costos
//!
//! Las tablas de tarifas son de lectura intensiva y cambian poco; este
//! cache en memoria con TTL evita repetir consultas dentro de una misma
//! operación y entre solicitudes cercanas. Los errores del almacén nunca
//! se cachean: la consulta falla cerrada y la entrada se invalida.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::tarifa::{OtrosCostos, Tarifa};
use crate::repositories::tarifa_repository::TariffStore;
use crate::utils::city::city_key;
use crate::utils::errors::EngineResult;

/// Entrada cacheada con su momento de creación
#[derive(Debug, Clone)]
struct CachedEntry<T> {
    value: T,
    created_at: u64,
}

/// Estadísticas del cache
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries_expired: u64,
    pub entries_evicted: u64,
}

/// Cache de lectura a través del almacén de tarifas
pub struct TarifaCache {
    store: Arc<dyn TariffStore>,
    tarifas: RwLock<HashMap<(String, String), CachedEntry<Tarifa>>>,
    otros_costos: RwLock<HashMap<String, CachedEntry<OtrosCostos>>>,
    stats: RwLock<CacheStats>,
    ttl_seconds: u64,
    max_entries: usize,
}

impl TarifaCache {
    pub fn new(store: Arc<dyn TariffStore>, ttl_seconds: u64, max_entries: usize) -> Self {
        Self {
            store,
            tarifas: RwLock::new(HashMap::new()),
            otros_costos: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
            ttl_seconds,
            max_entries,
        }
    }

    /// Tarifa de un par origen-destino, cacheada
    pub async fn tariff(&self, origin: &str, destination: &str) -> EngineResult<Tarifa> {
        let key = (city_key(origin), city_key(destination));

        {
            let mut tarifas = self.tarifas.write().await;
            let mut stats = self.stats.write().await;
            if let Some(entry) = tarifas.get(&key) {
                if self.is_expired(entry.created_at) {
                    tarifas.remove(&key);
                    stats.entries_expired += 1;
                    stats.misses += 1;
                } else {
                    stats.hits += 1;
                    debug!(origen = %key.0, destino = %key.1, "cache hit de tarifa");
                    return Ok(entry.value.clone());
                }
            } else {
                stats.misses += 1;
            }
        }

        match self.store.tariff(origin, destination).await {
            Ok(tarifa) => {
                let mut tarifas = self.tarifas.write().await;
                if tarifas.len() >= self.max_entries {
                    Self::evict_oldest(&mut tarifas, &mut *self.stats.write().await);
                }
                tarifas.insert(
                    key,
                    CachedEntry {
                        value: tarifa.clone(),
                        created_at: Self::now(),
                    },
                );
                Ok(tarifa)
            }
            Err(e) => {
                // Fallo cerrado: la entrada previa, si la hubo, ya no es confiable
                self.tarifas.write().await.remove(&key);
                Err(e)
            }
        }
    }

    /// Otros costos por tipo de vehículo, cacheados
    pub async fn other_costs(&self, vehicle_type: &str) -> EngineResult<OtrosCostos> {
        let key = vehicle_type.trim().to_uppercase();

        {
            let mut costos = self.otros_costos.write().await;
            let mut stats = self.stats.write().await;
            if let Some(entry) = costos.get(&key) {
                if self.is_expired(entry.created_at) {
                    costos.remove(&key);
                    stats.entries_expired += 1;
                    stats.misses += 1;
                } else {
                    stats.hits += 1;
                    return Ok(entry.value.clone());
                }
            } else {
                stats.misses += 1;
            }
        }

        match self.store.other_costs(vehicle_type).await {
            Ok(valor) => {
                let mut costos = self.otros_costos.write().await;
                if costos.len() >= self.max_entries {
                    Self::evict_oldest(&mut costos, &mut *self.stats.write().await);
                }
                costos.insert(
                    key,
                    CachedEntry {
                        value: valor.clone(),
                        created_at: Self::now(),
                    },
                );
                Ok(valor)
            }
            Err(e) => {
                self.otros_costos.write().await.remove(&key);
                Err(e)
            }
        }
    }

    /// Invalida la tarifa de un par origen-destino
    pub async fn invalidate(&self, origin: &str, destination: &str) {
        let key = (city_key(origin), city_key(destination));
        self.tarifas.write().await.remove(&key);
    }

    /// Vacía el cache completo
    pub async fn clear(&self) {
        self.tarifas.write().await.clear();
        self.otros_costos.write().await.clear();
        debug!("cache de tarifas limpiado");
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    fn is_expired(&self, created_at: u64) -> bool {
        Self::now().saturating_sub(created_at) > self.ttl_seconds
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn evict_oldest<K: Clone + std::hash::Hash + Eq, T>(
        map: &mut HashMap<K, CachedEntry<T>>,
        stats: &mut CacheStats,
    ) {
        let oldest = map
            .iter()
            .min_by_key(|(_, e)| e.created_at)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            map.remove(&key);
            stats.entries_evicted += 1;
        }
    }
}
