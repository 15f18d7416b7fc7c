mod assignor;
pub mod backend;
pub mod cache;
mod coordinator;
pub mod error;
mod grpc_service;
pub mod model;
pub mod registry;
mod routing;
pub mod table;

use std::{
    error::Error,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

pub use assignor::PartitionAssignor;
use backend::GrpcConnector;
pub use coordinator::Coordinator;
use envconfig::Envconfig;
pub use grpc_service::CoordinatorGrpcService;
use registry::StorageRegistry;
use tabgrid_pb::coordinator_service_server::CoordinatorServiceServer;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "COORD_PORT", default = "8000")]
    pub port: u16,
    /// Comma separated storage server addresses registered at startup.
    #[envconfig(from = "COORD_STORAGE_SERVERS")]
    pub storage_servers: Option<String>,
    /// Fixes the placement RNG so table layouts are reproducible.
    #[envconfig(from = "COORD_SEED")]
    pub seed: Option<u64>,
    #[envconfig(from = "COORD_POOL_MAX_OPEN", default = "16")]
    pub pool_max_open: u64,
    #[envconfig(from = "COORD_REFLECTION_ENABLED", default = "false")]
    pub reflection_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            storage_servers: None,
            seed: None,
            pool_max_open: 16,
            reflection_enabled: false,
        }
    }
}

impl Config {
    pub fn get_storage_servers(&self) -> Vec<String> {
        self.storage_servers
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(|a| a.trim())
                    .filter(|a| !a.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn create_registry(&self) -> StorageRegistry {
        match self.seed {
            Some(seed) => {
                info!("use placement seed {seed}");
                StorageRegistry::seeded(seed)
            }
            None => StorageRegistry::new(),
        }
    }
}

/// Builds a coordinator connected to the configured storage servers.
pub async fn create_coordinator(
    conf: &Config,
) -> Result<Arc<Coordinator>, Box<dyn Error>> {
    let coordinator = Coordinator::new(
        Arc::new(conf.create_registry()),
        Arc::new(GrpcConnector::new(conf.pool_max_open)),
    );
    for addr in conf.get_storage_servers() {
        coordinator.register_storage_server(&addr).await?;
    }
    Ok(Arc::new(coordinator))
}

/// Serves the coordinator over gRPC until `token` is cancelled.
pub async fn start_server(
    conf: &Config,
    token: CancellationToken,
) -> Result<(Arc<Coordinator>, SocketAddr), Box<dyn Error>> {
    let coordinator = create_coordinator(conf).await?;
    let socket = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), conf.port);
    let listener = tokio::net::TcpListener::bind(socket).await?;
    let local_addr = listener.local_addr()?;

    let reflection = if conf.reflection_enabled {
        Some(
            tonic_reflection::server::Builder::configure()
                .register_encoded_file_descriptor_set(
                    tabgrid_pb::FILE_DESCRIPTOR_SET,
                )
                .build_v1()?,
        )
    } else {
        None
    };
    let service = CoordinatorGrpcService::new(coordinator.clone());
    tokio::spawn(async move {
        let result = tonic::transport::Server::builder()
            .add_optional_service(reflection)
            .add_service(CoordinatorServiceServer::new(service))
            .serve_with_incoming_shutdown(
                TcpListenerStream::new(listener),
                token.cancelled_owned(),
            )
            .await;
        if let Err(e) = result {
            error!("coordinator server stopped: {e}");
        }
    });
    info!("start coordinator on {}", local_addr);
    Ok((coordinator, local_addr))
}
