//! Serialización de escrituras por vehículo
//!
//! La unidad de serialización del motor es el consecutivo de vehículo:
//! dos escrituras sobre el mismo vehículo nunca corren en paralelo. Las
//! fusiones toman los candados de todos los participantes en orden
//! alfabético para evitar interbloqueos; las divisiones solo toman el del
//! vehículo origen (los hijos no existen hasta soltar el candado).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Candados asíncronos por consecutivo de vehículo
#[derive(Default)]
pub struct BundleLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BundleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toma el candado de un vehículo
    pub async fn acquire(&self, vehiculo: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(vehiculo.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Toma los candados de varios vehículos en orden alfabético.
    /// Los duplicados se toman una sola vez.
    pub async fn acquire_many(&self, vehiculos: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut ordenados: Vec<&String> = vehiculos.iter().collect();
        ordenados.sort();
        ordenados.dedup();

        let mut guards = Vec::with_capacity(ordenados.len());
        for vehiculo in ordenados {
            guards.push(self.acquire(vehiculo).await);
        }
        guards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_bundle_serializes() {
        let locks = Arc::new(BundleLocks::new());
        let guard = locks.acquire("FUNZA-20240101-ABC123").await;

        let locks2 = locks.clone();
        let pending = tokio::spawn(async move {
            let _g = locks2.acquire("FUNZA-20240101-ABC123").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("el segundo candado debe liberarse")
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_bundles_do_not_block() {
        let locks = BundleLocks::new();
        let _a = locks.acquire("FUNZA-20240101-AAA111").await;
        let _b = locks.acquire("FUNZA-20240101-BBB222").await;
    }

    #[tokio::test]
    async fn test_acquire_many_dedupes() {
        let locks = BundleLocks::new();
        let guards = locks
            .acquire_many(&[
                "V2".to_string(),
                "V1".to_string(),
                "V2".to_string(),
            ])
            .await;
        assert_eq!(guards.len(), 2);
    }
}
