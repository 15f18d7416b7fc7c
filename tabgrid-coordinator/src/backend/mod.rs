mod grpc;
#[cfg(test)]
pub(crate) mod mock;

use std::{fmt, sync::Arc};

pub use grpc::{GrpcConnector, GrpcStorageBackend, StorageRpcManager};

use crate::{
    error::{BackendError, CoordinatorError},
    model::{DatabaseConfig, Line, TableSchema},
};

/// Operations a storage backend owning physical partitions must serve.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    async fn register(&self, db: &DatabaseConfig) -> Result<(), BackendError>;

    async fn create_table(&self, schema: &TableSchema)
    -> Result<(), BackendError>;

    async fn delete_table(&self, name: &str) -> Result<(), BackendError>;

    async fn insert_line(&self, line: &Line) -> Result<(), BackendError>;

    async fn delete_line(
        &self,
        table: &str,
        primary_key: &str,
        primary_key_value: &str,
    ) -> Result<(), BackendError>;

    async fn update_line(&self, line: &Line) -> Result<(), BackendError>;

    async fn get_line(
        &self,
        table: &str,
        primary_key: &str,
        primary_key_value: &str,
    ) -> Result<Line, BackendError>;
}

/// Opens a handle to the storage backend listening on an address.
#[async_trait::async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(
        &self,
        addr: &str,
    ) -> Result<StorageBackendHandle, CoordinatorError>;
}

/// Shared reference to one reachable storage backend.
#[derive(Clone)]
pub struct StorageBackendHandle {
    addr: Arc<str>,
    backend: Arc<dyn StorageBackend>,
}

impl StorageBackendHandle {
    pub fn new(addr: &str, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            addr: Arc::from(addr),
            backend,
        }
    }

    #[inline]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    #[inline]
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for StorageBackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBackendHandle")
            .field("addr", &self.addr)
            .finish()
    }
}

impl PartialEq for StorageBackendHandle {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for StorageBackendHandle {}
