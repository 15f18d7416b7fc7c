use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tonic::Status;

use crate::{
    error::{BackendError, CoordinatorError},
    model::{DatabaseConfig, Line, TableSchema},
};

use super::{BackendConnector, StorageBackend, StorageBackendHandle};

/// In-process storage backend with call counting and failure injection.
#[derive(Default)]
pub struct MockBackend {
    tables: Mutex<BTreeMap<String, BTreeMap<String, Line>>>,
    failing: Mutex<HashSet<&'static str>>,
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    calls: AtomicUsize,
}

impl MockBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn fail_on(&self, op: &'static str) {
        self.failing.lock().await.insert(op);
    }

    /// Stalls inserts into `table` until the returned guard is dropped.
    pub async fn hold(&self, table: &str) -> OwnedMutexGuard<()> {
        let gate = self
            .gates
            .lock()
            .await
            .entry(table.into())
            .or_default()
            .clone();
        gate.lock_owned().await
    }

    pub async fn table_names(&self) -> Vec<String> {
        self.tables.lock().await.keys().cloned().collect()
    }

    pub async fn rows(&self, table: &str) -> Vec<Line> {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    async fn enter(&self, op: &'static str) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().await.contains(op) {
            return Err(BackendError::Rpc(Status::internal(format!(
                "injected {op} failure"
            ))));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageBackend for MockBackend {
    async fn register(&self, db: &DatabaseConfig) -> Result<(), BackendError> {
        self.enter("register").await?;
        if db.db_type != "memory" {
            return Err(BackendError::UnsupportedType(db.db_type.clone()));
        }
        Ok(())
    }

    async fn create_table(
        &self,
        schema: &TableSchema,
    ) -> Result<(), BackendError> {
        self.enter("create_table").await?;
        self.tables
            .lock()
            .await
            .insert(schema.name.clone(), BTreeMap::new());
        Ok(())
    }

    async fn delete_table(&self, name: &str) -> Result<(), BackendError> {
        self.enter("delete_table").await?;
        self.tables
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(name.into()))
    }

    async fn insert_line(&self, line: &Line) -> Result<(), BackendError> {
        self.enter("insert_line").await?;
        let gate = self.gates.lock().await.get(&line.table).cloned();
        if let Some(gate) = gate {
            drop(gate.lock().await);
        }
        let mut tables = self.tables.lock().await;
        let table = tables
            .get_mut(&line.table)
            .ok_or_else(|| BackendError::NotFound(line.table.clone()))?;
        let key = line.primary_key_value().unwrap_or_default().to_string();
        table.insert(key, line.clone());
        Ok(())
    }

    async fn delete_line(
        &self,
        table: &str,
        _primary_key: &str,
        primary_key_value: &str,
    ) -> Result<(), BackendError> {
        self.enter("delete_line").await?;
        if let Some(t) = self.tables.lock().await.get_mut(table) {
            t.remove(primary_key_value);
        }
        Ok(())
    }

    async fn update_line(&self, line: &Line) -> Result<(), BackendError> {
        self.enter("update_line").await?;
        let mut tables = self.tables.lock().await;
        if let Some(t) = tables.get_mut(&line.table) {
            let key = line.primary_key_value().unwrap_or_default();
            if let Some(row) = t.get_mut(key) {
                row.columns.extend(line.columns.clone());
            }
        }
        Ok(())
    }

    async fn get_line(
        &self,
        table: &str,
        primary_key: &str,
        primary_key_value: &str,
    ) -> Result<Line, BackendError> {
        self.enter("get_line").await?;
        self.tables
            .lock()
            .await
            .get(table)
            .and_then(|t| {
                t.values().find(|row| {
                    row.columns.get(primary_key).map(|v| v.as_str())
                        == Some(primary_key_value)
                })
            })
            .cloned()
            .ok_or_else(|| BackendError::NotFound(primary_key_value.into()))
    }
}

/// Hands out pre-built mock backends by address.
#[derive(Default, Clone)]
pub struct MockConnector {
    pub backends: Arc<Mutex<BTreeMap<String, Arc<MockBackend>>>>,
}

impl MockConnector {
    pub async fn backend(&self, addr: &str) -> Arc<MockBackend> {
        self.backends
            .lock()
            .await
            .entry(addr.into())
            .or_default()
            .clone()
    }

    pub async fn total_calls(&self) -> usize {
        self.backends
            .lock()
            .await
            .values()
            .map(|b| b.calls())
            .sum()
    }
}

#[async_trait::async_trait]
impl BackendConnector for MockConnector {
    async fn connect(
        &self,
        addr: &str,
    ) -> Result<StorageBackendHandle, CoordinatorError> {
        if addr.starts_with("unreachable") {
            return Err(CoordinatorError::ConnectFailure {
                addr: addr.into(),
                source: BackendError::Pool("timeout".into()),
            });
        }
        let backend = self.backend(addr).await;
        Ok(StorageBackendHandle::new(addr, backend))
    }
}
