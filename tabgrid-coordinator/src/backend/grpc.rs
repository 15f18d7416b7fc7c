use std::{str::FromStr, sync::Arc};

use mobc::{Manager, Pool};
use tabgrid_pb::{
    DeleteLineRequest, GetLineRequest, Table, TableRef,
    storage_service_client::StorageServiceClient,
};
use tonic::{
    Code,
    transport::{Channel, Uri},
};
use tracing::{debug, info};

use crate::{
    error::{BackendError, CoordinatorError},
    model::{DatabaseConfig, Line, TableSchema},
};

use super::{BackendConnector, StorageBackend, StorageBackendHandle};

#[derive(Debug)]
pub struct StorageRpcManager {
    uri: Uri,
}

impl StorageRpcManager {
    pub fn new(addr: &str) -> Result<Self, BackendError> {
        let uri = Uri::from_str(&normalize_addr(addr))?;
        info!("create storage RPC manager for '{}'", uri);
        Ok(Self { uri })
    }
}

#[async_trait::async_trait]
impl Manager for StorageRpcManager {
    type Connection = StorageServiceClient<Channel>;

    type Error = BackendError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let channel = Channel::builder(self.uri.clone()).connect().await?;
        debug!("create new storage client for '{:?}'", self.uri);
        Ok(StorageServiceClient::new(channel))
    }

    async fn check(
        &self,
        conn: Self::Connection,
    ) -> Result<Self::Connection, Self::Error> {
        Ok(conn)
    }
}

/// Storage backend reached over gRPC through a pool of clients.
pub struct GrpcStorageBackend {
    pool: Pool<StorageRpcManager>,
}

impl GrpcStorageBackend {
    pub fn new(addr: &str, max_open: u64) -> Result<Self, BackendError> {
        let manager = StorageRpcManager::new(addr)?;
        let pool = Pool::builder().max_open(max_open).build(manager);
        Ok(Self { pool })
    }

    /// Checks out one client so an unreachable server fails fast.
    pub async fn ping(&self) -> Result<(), BackendError> {
        self.pool.get().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageBackend for GrpcStorageBackend {
    async fn register(&self, db: &DatabaseConfig) -> Result<(), BackendError> {
        let mut conn = self.pool.get().await?;
        match conn.register(tabgrid_pb::Database::from(db)).await {
            Ok(_) => Ok(()),
            Err(status) if status.code() == Code::InvalidArgument => {
                Err(BackendError::UnsupportedType(db.db_type.clone()))
            }
            Err(status) => Err(BackendError::from(status)),
        }
    }

    async fn create_table(
        &self,
        schema: &TableSchema,
    ) -> Result<(), BackendError> {
        let mut conn = self.pool.get().await?;
        conn.create_table(Table::from(schema)).await?;
        Ok(())
    }

    async fn delete_table(&self, name: &str) -> Result<(), BackendError> {
        let mut conn = self.pool.get().await?;
        conn.delete_table(TableRef::from(name)).await?;
        Ok(())
    }

    async fn insert_line(&self, line: &Line) -> Result<(), BackendError> {
        let mut conn = self.pool.get().await?;
        conn.insert_line(tabgrid_pb::Line::from(line)).await?;
        Ok(())
    }

    async fn delete_line(
        &self,
        table: &str,
        primary_key: &str,
        primary_key_value: &str,
    ) -> Result<(), BackendError> {
        let mut conn = self.pool.get().await?;
        conn.delete_line(DeleteLineRequest {
            table: table.into(),
            primary_key: primary_key.into(),
            primary_key_value: primary_key_value.into(),
        })
        .await?;
        Ok(())
    }

    async fn update_line(&self, line: &Line) -> Result<(), BackendError> {
        let mut conn = self.pool.get().await?;
        conn.update_line(tabgrid_pb::Line::from(line)).await?;
        Ok(())
    }

    async fn get_line(
        &self,
        table: &str,
        primary_key: &str,
        primary_key_value: &str,
    ) -> Result<Line, BackendError> {
        let mut conn = self.pool.get().await?;
        let resp = conn
            .get_line(GetLineRequest {
                table: Some(Table {
                    name: table.into(),
                    primary_key: primary_key.into(),
                    ..Default::default()
                }),
                primary_key_value: primary_key_value.into(),
            })
            .await?;
        Ok(Line::from(resp.into_inner()))
    }
}

/// Connects to storage servers over gRPC, one client pool per server.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    max_open: u64,
}

impl GrpcConnector {
    pub fn new(max_open: u64) -> Self {
        Self { max_open }
    }
}

#[async_trait::async_trait]
impl BackendConnector for GrpcConnector {
    async fn connect(
        &self,
        addr: &str,
    ) -> Result<StorageBackendHandle, CoordinatorError> {
        let connect_err = |source| CoordinatorError::ConnectFailure {
            addr: addr.into(),
            source,
        };
        let backend =
            GrpcStorageBackend::new(addr, self.max_open).map_err(connect_err)?;
        backend.ping().await.map_err(connect_err)?;
        Ok(StorageBackendHandle::new(addr, Arc::new(backend)))
    }
}

pub(crate) fn normalize_addr(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}
