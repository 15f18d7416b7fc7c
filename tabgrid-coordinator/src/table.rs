use tokio::sync::{Mutex, MutexGuard};

use crate::{backend::StorageBackendHandle, model::TableSchema};

/// One physical shard of a logical table hosted on a storage backend.
#[derive(Debug, Clone)]
pub struct TablePartition {
    pub backend: StorageBackendHandle,
    pub name: String,
    pub row_count: u64,
}

impl TablePartition {
    pub fn new(backend: StorageBackendHandle, name: String) -> Self {
        Self {
            backend,
            name,
            row_count: 0,
        }
    }
}

pub fn primary_partition_name(table: &str, index: usize) -> String {
    format!("{table}_partition_{index}")
}

pub fn replica_partition_name(table: &str, index: usize) -> String {
    format!("{table}_partition_replica_{index}")
}

/// Primary and replica partitions, paired by index.
#[derive(Debug, Default)]
pub struct PartitionSet {
    pub primaries: Vec<TablePartition>,
    pub replicas: Vec<TablePartition>,
}

impl PartitionSet {
    /// A table whose provisioning failed or that was dropped has no partitions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primaries.is_empty()
    }

    /// Index of the primary with the fewest rows; the lowest index wins ties.
    pub fn least_loaded(&self) -> Option<usize> {
        let mut chosen: Option<(usize, u64)> = None;
        for (i, p) in self.primaries.iter().enumerate() {
            match chosen {
                Some((_, min)) if p.row_count >= min => {}
                _ => chosen = Some((i, p.row_count)),
            }
        }
        chosen.map(|(i, _)| i)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&TablePartition, &TablePartition)> {
        self.primaries.iter().zip(self.replicas.iter())
    }

    /// Primaries followed by replicas.
    pub fn all(&self) -> impl Iterator<Item = &TablePartition> {
        self.primaries.iter().chain(self.replicas.iter())
    }

    pub(crate) fn record_insert(&mut self, index: usize) {
        self.primaries[index].row_count += 1;
        self.replicas[index].row_count += 1;
    }
}

/// Coordinator-side view of a logical table.
#[derive(Debug)]
pub struct CoordinatorTable {
    schema: TableSchema,
    partitions: Mutex<PartitionSet>,
}

impl CoordinatorTable {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            partitions: Mutex::new(PartitionSet::default()),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    #[inline]
    pub fn primary_key(&self) -> &str {
        &self.schema.primary_key
    }

    #[inline]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Takes the per-table lock serializing operations on this table.
    pub async fn lock(&self) -> MutexGuard<'_, PartitionSet> {
        self.partitions.lock().await
    }

    pub async fn layout(&self) -> TableLayout {
        let partitions = self.partitions.lock().await;
        let describe = |p: &TablePartition| PartitionInfo {
            name: p.name.clone(),
            addr: p.backend.addr().to_string(),
            row_count: p.row_count,
        };
        TableLayout {
            table: self.schema.name.clone(),
            primary_key: self.schema.primary_key.clone(),
            primaries: partitions.primaries.iter().map(describe).collect(),
            replicas: partitions.replicas.iter().map(describe).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PartitionInfo {
    pub name: String,
    pub addr: String,
    pub row_count: u64,
}

/// Snapshot of a table's placement and row counts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TableLayout {
    pub table: String,
    pub primary_key: String,
    pub primaries: Vec<PartitionInfo>,
    pub replicas: Vec<PartitionInfo>,
}

impl TableLayout {
    pub fn primary_row_counts(&self) -> Vec<u64> {
        self.primaries.iter().map(|p| p.row_count).collect()
    }

    pub fn replica_row_counts(&self) -> Vec<u64> {
        self.replicas.iter().map(|p| p.row_count).collect()
    }
}
