use tabgrid_pb::{
    Database, DeleteLineRequest, EmptyResponse, GetLineRequest, Line, Table,
    TableRef, storage_service_server::StorageService,
};
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::{
    connector::{DbConnector, create_connector},
    error::StorageError,
};

/// Storage server endpoint. Every call after `Register` is forwarded to the
/// connector of the registered database.
pub struct StorageGrpcService {
    connector: RwLock<Option<Box<dyn DbConnector>>>,
}

impl StorageGrpcService {
    pub fn new() -> Self {
        Self {
            connector: RwLock::new(None),
        }
    }

    /// Attaches to `db`, replacing any previously registered database.
    pub async fn register(&self, db: &Database) -> Result<(), StorageError> {
        let connector = create_connector(&db.r#type)?;
        connector.connect(db).await?;
        let mut guard = self.connector.write().await;
        if let Some(old) = guard.replace(connector) {
            if let Err(e) = old.disconnect().await {
                warn!("disconnect previous database: {e}");
            }
        }
        info!(
            "registered {} database '{}' at {}:{}",
            db.r#type, db.database, db.host, db.port
        );
        Ok(())
    }

    pub async fn is_registered(&self) -> bool {
        self.connector.read().await.is_some()
    }
}

impl Default for StorageGrpcService {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! with_connector {
    ($self:ident, $conn:ident => $body:expr) => {{
        let guard = $self.connector.read().await;
        let $conn = guard.as_deref().ok_or(StorageError::NotRegistered)?;
        $body.await?
    }};
}

#[tonic::async_trait]
impl StorageService for StorageGrpcService {
    async fn register(
        &self,
        request: Request<Database>,
    ) -> Result<Response<EmptyResponse>, Status> {
        StorageGrpcService::register(self, request.get_ref()).await?;
        Ok(Response::new(EmptyResponse {}))
    }

    async fn create_table(
        &self,
        request: Request<Table>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let table = request.into_inner();
        info!("create table '{}'", table.name);
        with_connector!(self, conn => conn.create_table(table));
        Ok(Response::new(EmptyResponse {}))
    }

    async fn delete_table(
        &self,
        request: Request<TableRef>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let name = request.into_inner().name;
        info!("delete table '{}'", name);
        with_connector!(self, conn => conn.delete_table(&name));
        Ok(Response::new(EmptyResponse {}))
    }

    async fn insert_line(
        &self,
        request: Request<Line>,
    ) -> Result<Response<EmptyResponse>, Status> {
        with_connector!(self, conn => conn.insert_line(request.into_inner()));
        Ok(Response::new(EmptyResponse {}))
    }

    async fn delete_line(
        &self,
        request: Request<DeleteLineRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        with_connector!(self, conn => conn.delete_line(request.into_inner()));
        Ok(Response::new(EmptyResponse {}))
    }

    async fn update_line(
        &self,
        request: Request<Line>,
    ) -> Result<Response<EmptyResponse>, Status> {
        with_connector!(self, conn => conn.update_line(request.into_inner()));
        Ok(Response::new(EmptyResponse {}))
    }

    async fn get_line(
        &self,
        request: Request<GetLineRequest>,
    ) -> Result<Response<Line>, Status> {
        let request = request.into_inner();
        let table = request
            .table
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_default();
        let mut line = with_connector!(self, conn => conn.get_line(request));
        line.table = table;
        Ok(Response::new(line))
    }
}
