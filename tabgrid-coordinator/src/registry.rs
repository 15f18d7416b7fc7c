use std::collections::BTreeMap;

use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::{backend::StorageBackendHandle, error::CoordinatorError};

/// Live set of reachable storage backends, keyed by address.
pub struct StorageRegistry {
    servers: RwLock<BTreeMap<String, StorageBackendHandle>>,
    rng: Mutex<StdRng>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            servers: RwLock::new(BTreeMap::new()),
            rng: Mutex::new(rng),
        }
    }

    /// Adds or replaces the handle for its address.
    pub async fn register(&self, handle: StorageBackendHandle) {
        let addr = handle.addr().to_string();
        let replaced = self.servers.write().await.insert(addr.clone(), handle);
        if replaced.is_some() {
            info!("replace storage server '{addr}'");
        } else {
            info!("register storage server '{addr}'");
        }
    }

    pub async fn len(&self) -> usize {
        self.servers.read().await.len()
    }

    pub async fn addresses(&self) -> Vec<String> {
        self.servers.read().await.keys().cloned().collect()
    }

    pub async fn get(&self, addr: &str) -> Option<StorageBackendHandle> {
        self.servers.read().await.get(addr).cloned()
    }

    /// Draws `n` distinct handles, uniformly shuffled.
    pub async fn random_sample(
        &self,
        n: usize,
    ) -> Result<Vec<StorageBackendHandle>, CoordinatorError> {
        let mut snapshot: Vec<StorageBackendHandle> =
            self.servers.read().await.values().cloned().collect();
        if n > snapshot.len() {
            return Err(CoordinatorError::InsufficientBackends {
                required: n,
                available: snapshot.len(),
            });
        }
        let mut rng = self.rng.lock().await;
        fisher_yates(&mut snapshot, &mut *rng);
        snapshot.truncate(n);
        Ok(snapshot)
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;
    use crate::backend::mock::MockBackend;

    fn handle(addr: &str) -> StorageBackendHandle {
        StorageBackendHandle::new(addr, Arc::new(MockBackend::default()))
    }

    async fn registry_of(seed: u64, n: usize) -> StorageRegistry {
        let registry = StorageRegistry::seeded(seed);
        for i in 0..n {
            registry.register(handle(&format!("storage-{i}:9001"))).await;
        }
        registry
    }

    #[tokio::test]
    async fn register_is_idempotent_per_address() {
        let registry = StorageRegistry::seeded(1);
        registry.register(handle("storage-0:9001")).await;
        registry.register(handle("storage-0:9001")).await;
        registry.register(handle("storage-1:9001")).await;
        assert_eq!(registry.len().await, 2);
        assert_eq!(
            registry.addresses().await,
            vec!["storage-0:9001".to_string(), "storage-1:9001".to_string()]
        );
    }

    #[tokio::test]
    async fn sample_returns_distinct_handles() {
        let registry = registry_of(7, 6).await;
        let sample = registry.random_sample(4).await.unwrap();
        assert_eq!(sample.len(), 4);
        let addrs: HashSet<&str> = sample.iter().map(|h| h.addr()).collect();
        assert_eq!(addrs.len(), 4);
    }

    #[tokio::test]
    async fn sample_larger_than_registry_fails() {
        let registry = registry_of(7, 3).await;
        let err = registry.random_sample(4).await.unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::InsufficientBackends {
                required: 4,
                available: 3
            }
        ));
    }

    #[tokio::test]
    async fn same_seed_gives_same_sample() {
        let a = registry_of(42, 8).await.random_sample(8).await.unwrap();
        let b = registry_of(42, 8).await.random_sample(8).await.unwrap();
        let a: Vec<&str> = a.iter().map(|h| h.addr()).collect();
        let b: Vec<&str> = b.iter().map(|h| h.addr()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn fisher_yates_keeps_every_element() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut items: Vec<u32> = (0..32).collect();
        fisher_yates(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..32).collect::<Vec<u32>>());
    }

    #[test]
    fn fisher_yates_hits_every_position() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen_first = HashSet::new();
        for _ in 0..200 {
            let mut items = [0, 1, 2, 3];
            fisher_yates(&mut items, &mut rng);
            seen_first.insert(items[0]);
        }
        assert_eq!(seen_first.len(), 4);
    }
}
