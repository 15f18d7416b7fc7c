use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    assignor::PartitionAssignor,
    backend::BackendConnector,
    cache::{LineCache, MemoryLineCache},
    error::{BackendError, CoordinatorError},
    model::{TableSchema, validate_schema},
    registry::StorageRegistry,
    table::{CoordinatorTable, TableLayout},
};

/// Entry point for table and line operations against the storage pool.
pub struct Coordinator {
    pub(crate) registry: Arc<StorageRegistry>,
    assignor: PartitionAssignor,
    connector: Arc<dyn BackendConnector>,
    tables: RwLock<BTreeMap<String, Arc<CoordinatorTable>>>,
    pub(crate) cache: Arc<dyn LineCache>,
}

impl Coordinator {
    pub fn new(
        registry: Arc<StorageRegistry>,
        connector: Arc<dyn BackendConnector>,
    ) -> Self {
        Self::with_cache(registry, connector, Arc::new(MemoryLineCache::new()))
    }

    pub fn with_cache(
        registry: Arc<StorageRegistry>,
        connector: Arc<dyn BackendConnector>,
        cache: Arc<dyn LineCache>,
    ) -> Self {
        Self {
            assignor: PartitionAssignor::new(registry.clone()),
            registry,
            connector,
            tables: RwLock::new(BTreeMap::new()),
            cache,
        }
    }

    /// Connects to a storage server and makes it available to future tables.
    pub async fn register_storage_server(
        &self,
        addr: &str,
    ) -> Result<(), CoordinatorError> {
        let handle = self.connector.connect(addr).await?;
        self.registry.register(handle).await;
        Ok(())
    }

    pub async fn registered_servers(&self) -> Vec<String> {
        self.registry.addresses().await
    }

    pub async fn create_table(
        &self,
        schema: TableSchema,
        partition_count: u32,
    ) -> Result<(), CoordinatorError> {
        validate_schema(&schema, partition_count)?;
        let table = Arc::new(CoordinatorTable::new(schema));
        // Held across provisioning so other operations on this name wait.
        let mut partitions = table.lock().await;
        {
            let mut tables = self.tables.write().await;
            if tables.contains_key(table.name()) {
                return Err(CoordinatorError::AlreadyExists(
                    table.name().into(),
                ));
            }
            tables.insert(table.name().into(), table.clone());
        }

        match self.assignor.provision(table.schema(), partition_count).await {
            Ok(set) => {
                *partitions = set;
                info!(
                    "create table '{}' with {partition_count} partitions",
                    table.name()
                );
                Ok(())
            }
            Err(e) => {
                warn!("failed to create table '{}': {e}", table.name());
                self.remove_entry(&table).await;
                Err(e)
            }
        }
    }

    pub async fn delete_table(&self, name: &str) -> Result<(), CoordinatorError> {
        let table = self.get_table(name).await?;
        let mut partitions = table.lock().await;
        if partitions.is_empty() {
            return Err(CoordinatorError::TableNotFound(name.into()));
        }
        for p in partitions.all() {
            match p.backend.backend().delete_table(&p.name).await {
                Ok(()) => {}
                Err(BackendError::NotFound(_)) => {
                    warn!(
                        "partition '{}' already absent on '{}'",
                        p.name,
                        p.backend.addr()
                    );
                }
                Err(e) => return Err(CoordinatorError::remote(p.backend.addr(), e)),
            }
        }
        partitions.primaries.clear();
        partitions.replicas.clear();
        self.remove_entry(&table).await;
        info!("delete table '{name}'");
        Ok(())
    }

    pub async fn get_table(
        &self,
        name: &str,
    ) -> Result<Arc<CoordinatorTable>, CoordinatorError> {
        self.tables
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CoordinatorError::TableNotFound(name.into()))
    }

    pub async fn table_names(&self) -> Vec<String> {
        self.tables.read().await.keys().cloned().collect()
    }

    pub async fn table_layout(
        &self,
        name: &str,
    ) -> Result<TableLayout, CoordinatorError> {
        let table = self.get_table(name).await?;
        let layout = table.layout().await;
        if layout.primaries.is_empty() {
            return Err(CoordinatorError::TableNotFound(name.into()));
        }
        Ok(layout)
    }

    async fn remove_entry(&self, table: &Arc<CoordinatorTable>) {
        let mut tables = self.tables.write().await;
        if let Some(current) = tables.get(table.name()) {
            if Arc::ptr_eq(current, table) {
                tables.remove(table.name());
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        backend::{StorageBackend, mock::MockConnector},
        cache::CacheKey,
        model::{line, orders_schema},
    };

    pub(crate) async fn coordinator_with(
        n: usize,
    ) -> (Coordinator, MockConnector) {
        let connector = MockConnector::default();
        let coordinator = Coordinator::new(
            Arc::new(StorageRegistry::seeded(17)),
            Arc::new(connector.clone()),
        );
        for i in 0..n {
            coordinator
                .register_storage_server(&format!("storage-{i}:9001"))
                .await
                .unwrap();
        }
        (coordinator, connector)
    }

    #[tokio::test]
    async fn register_unreachable_server_fails() {
        let (coordinator, _) = coordinator_with(0).await;
        let err = coordinator
            .register_storage_server("unreachable:9001")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::ConnectFailure { .. }));
        assert!(coordinator.registered_servers().await.is_empty());
    }

    #[tokio::test]
    async fn create_table_places_pairs_on_distinct_backends() {
        let (coordinator, _) = coordinator_with(4).await;
        coordinator.create_table(orders_schema(), 2).await.unwrap();
        let layout = coordinator.table_layout("orders").await.unwrap();
        assert_eq!(layout.primaries.len(), 2);
        assert_eq!(layout.replicas.len(), 2);
        let mut addrs: Vec<&str> = layout
            .primaries
            .iter()
            .chain(layout.replicas.iter())
            .map(|p| p.addr.as_str())
            .collect();
        addrs.sort();
        addrs.dedup();
        assert_eq!(addrs.len(), 4);
        assert_eq!(layout.primary_row_counts(), vec![0, 0]);
    }

    #[tokio::test]
    async fn create_table_validates_input() {
        let (coordinator, connector) = coordinator_with(4).await;
        let err = coordinator.create_table(orders_schema(), 0).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidArgument(_)));

        coordinator.create_table(orders_schema(), 1).await.unwrap();
        let calls = connector.total_calls().await;
        let err = coordinator.create_table(orders_schema(), 1).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::AlreadyExists(_)));
        assert_eq!(connector.total_calls().await, calls);
    }

    #[tokio::test]
    async fn insufficient_backends_leaves_no_table() {
        let (coordinator, _) = coordinator_with(3).await;
        let err = coordinator.create_table(orders_schema(), 2).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InsufficientBackends { .. }));
        assert!(coordinator.table_names().await.is_empty());
        // the name is free again once more backends join
        coordinator
            .register_storage_server("storage-3:9001")
            .await
            .unwrap();
        coordinator.create_table(orders_schema(), 2).await.unwrap();
    }

    #[tokio::test]
    async fn failed_provisioning_releases_the_name() {
        let (coordinator, connector) = coordinator_with(2).await;
        connector
            .backend("storage-1:9001")
            .await
            .fail_on("create_table")
            .await;
        let err = coordinator.create_table(orders_schema(), 1).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::RemoteCall { .. }));
        assert!(matches!(
            coordinator.get_table("orders").await,
            Err(CoordinatorError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_table_drops_every_partition() {
        let (coordinator, connector) = coordinator_with(4).await;
        coordinator.create_table(orders_schema(), 2).await.unwrap();
        coordinator.delete_table("orders").await.unwrap();
        for i in 0..4 {
            let backend = connector.backend(&format!("storage-{i}:9001")).await;
            assert!(backend.table_names().await.is_empty());
        }
        assert!(coordinator.get_table("orders").await.unwrap_err().is_not_found());
        assert!(coordinator.delete_table("orders").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_table_failure_keeps_the_entry() {
        let (coordinator, connector) = coordinator_with(2).await;
        coordinator.create_table(orders_schema(), 1).await.unwrap();
        connector
            .backend("storage-0:9001")
            .await
            .fail_on("delete_table")
            .await;
        let err = coordinator.delete_table("orders").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::RemoteCall { .. }));
        assert!(coordinator.get_table("orders").await.is_ok());
    }

    #[traced_test]
    #[tokio::test]
    async fn delete_table_tolerates_partitions_already_gone() {
        let (coordinator, connector) = coordinator_with(2).await;
        coordinator.create_table(orders_schema(), 1).await.unwrap();
        let layout = coordinator.table_layout("orders").await.unwrap();
        let primary = &layout.primaries[0];
        connector
            .backend(&primary.addr)
            .await
            .delete_table(&primary.name)
            .await
            .unwrap();

        coordinator.delete_table("orders").await.unwrap();
        assert!(coordinator.get_table("orders").await.unwrap_err().is_not_found());
        let replica = connector.backend(&layout.replicas[0].addr).await;
        assert!(replica.table_names().await.is_empty());
        assert!(logs_contain("already absent"));
    }

    #[tokio::test]
    async fn delete_table_keeps_cached_lines() {
        let (coordinator, _) = coordinator_with(2).await;
        coordinator.create_table(orders_schema(), 1).await.unwrap();
        coordinator
            .insert_line(line("orders", "id", &[("id", "1"), ("amount", "5")]))
            .await
            .unwrap();
        coordinator.delete_table("orders").await.unwrap();
        assert!(
            coordinator
                .cache
                .get(&CacheKey::new("orders", "1"))
                .await
                .is_some()
        );
    }
}
