use std::sync::Arc;

use tabgrid_pb::{
    CreateTableRequest, DeleteLineRequest, EmptyResponse, GetLineRequest, Line,
    RegisterStorageRequest, TableRef,
    coordinator_service_server::CoordinatorService,
};
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::{coordinator::Coordinator, model::TableSchema};

pub struct CoordinatorGrpcService {
    coordinator: Arc<Coordinator>,
}

impl CoordinatorGrpcService {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        CoordinatorGrpcService { coordinator }
    }
}

#[tonic::async_trait]
impl CoordinatorService for CoordinatorGrpcService {
    async fn register_storage_server(
        &self,
        request: Request<RegisterStorageRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        self.coordinator
            .register_storage_server(&req.address)
            .await?;
        Ok(Response::new(EmptyResponse {}))
    }

    async fn create_table(
        &self,
        request: Request<CreateTableRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let table = req
            .table
            .ok_or_else(|| Status::invalid_argument("table must not be none"))?;
        self.coordinator
            .create_table(TableSchema::from(table), req.partition_count)
            .await?;
        Ok(Response::new(EmptyResponse {}))
    }

    async fn delete_table(
        &self,
        request: Request<TableRef>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        self.coordinator.delete_table(&req.name).await?;
        Ok(Response::new(EmptyResponse {}))
    }

    async fn insert_line(
        &self,
        request: Request<Line>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let line = request.into_inner();
        debug!("insert line into '{}'", line.table);
        self.coordinator.insert_line(line.into()).await?;
        Ok(Response::new(EmptyResponse {}))
    }

    async fn delete_line(
        &self,
        request: Request<DeleteLineRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        self.coordinator
            .delete_line(&req.table, &req.primary_key_value)
            .await?;
        Ok(Response::new(EmptyResponse {}))
    }

    async fn update_line(
        &self,
        request: Request<Line>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let line = request.into_inner();
        self.coordinator.update_line(line.into()).await?;
        Ok(Response::new(EmptyResponse {}))
    }

    async fn get_line(
        &self,
        request: Request<GetLineRequest>,
    ) -> Result<Response<Line>, Status> {
        let req = request.into_inner();
        let table = req
            .table
            .ok_or_else(|| Status::invalid_argument("table must not be none"))?;
        let line = self
            .coordinator
            .get_line(&table.name, &table.primary_key, &req.primary_key_value)
            .await?;
        Ok(Response::new(line.into()))
    }
}
