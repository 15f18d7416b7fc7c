use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    backend::StorageBackendHandle,
    error::CoordinatorError,
    model::TableSchema,
    registry::StorageRegistry,
    table::{
        PartitionSet, TablePartition, primary_partition_name,
        replica_partition_name,
    },
};

/// Places the partitions of a new table on randomly drawn backends.
pub struct PartitionAssignor {
    registry: Arc<StorageRegistry>,
}

impl PartitionAssignor {
    pub fn new(registry: Arc<StorageRegistry>) -> Self {
        Self { registry }
    }

    /// Draws `2 * partition_count` distinct backends and creates one primary
    /// and one replica partition per index on them.
    pub async fn provision(
        &self,
        schema: &TableSchema,
        partition_count: u32,
    ) -> Result<PartitionSet, CoordinatorError> {
        let count = partition_count as usize;
        let mut handles = self.registry.random_sample(2 * count).await?;
        let replica_handles = handles.split_off(count);

        let mut set = PartitionSet {
            primaries: Vec::with_capacity(count),
            replicas: Vec::with_capacity(count),
        };
        for (i, (primary, replica)) in
            handles.into_iter().zip(replica_handles).enumerate()
        {
            let p = create_partition(
                schema,
                primary,
                primary_partition_name(&schema.name, i),
            )
            .await?;
            let r = create_partition(
                schema,
                replica,
                replica_partition_name(&schema.name, i),
            )
            .await?;
            set.primaries.push(p);
            set.replicas.push(r);
        }
        info!(
            "provisioned table '{}' with {} partitions: {:?}",
            schema.name,
            count,
            set.pairs()
                .map(|(p, r)| (p.backend.addr(), r.backend.addr()))
                .collect::<Vec<_>>()
        );
        Ok(set)
    }
}

async fn create_partition(
    schema: &TableSchema,
    backend: StorageBackendHandle,
    name: String,
) -> Result<TablePartition, CoordinatorError> {
    debug!("create partition '{}' on '{}'", name, backend.addr());
    backend
        .backend()
        .create_table(&schema.renamed(&name))
        .await
        .map_err(|e| CoordinatorError::remote(backend.addr(), e))?;
    Ok(TablePartition::new(backend, name))
}
