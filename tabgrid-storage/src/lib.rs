pub mod connector;
pub mod error;
mod service;

use std::{
    error::Error,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use envconfig::Envconfig;
pub use service::StorageGrpcService;
use tabgrid_pb::{Database, storage_service_server::StorageServiceServer};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "STORAGE_PORT", default = "9001")]
    pub port: u16,
    /// Registers this database at startup when set.
    #[envconfig(from = "STORAGE_DB_TYPE")]
    pub db_type: Option<String>,
    #[envconfig(from = "STORAGE_DB_HOST", default = "localhost")]
    pub db_host: String,
    #[envconfig(from = "STORAGE_DB_PORT", default = "0")]
    pub db_port: i32,
    #[envconfig(from = "STORAGE_DB_NAME", default = "tabgrid")]
    pub db_name: String,
    #[envconfig(from = "STORAGE_DB_USER", default = "")]
    pub db_user: String,
    #[envconfig(from = "STORAGE_DB_PASSWORD", default = "")]
    pub db_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9001,
            db_type: None,
            db_host: "localhost".into(),
            db_port: 0,
            db_name: "tabgrid".into(),
            db_user: String::new(),
            db_password: String::new(),
        }
    }
}

impl Config {
    pub fn get_database(&self) -> Option<Database> {
        self.db_type.as_ref().map(|t| Database {
            r#type: t.clone(),
            host: self.db_host.clone(),
            port: self.db_port,
            database: self.db_name.clone(),
            user: self.db_user.clone(),
            password: self.db_password.clone(),
        })
    }
}

/// Serves a storage server over gRPC until `token` is cancelled.
pub async fn start_server(
    conf: &Config,
    token: CancellationToken,
) -> Result<SocketAddr, Box<dyn Error>> {
    let service = Arc::new(StorageGrpcService::new());
    if let Some(db) = conf.get_database() {
        service.register(&db).await?;
    }
    let socket =
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), conf.port);
    let listener = tokio::net::TcpListener::bind(socket).await?;
    let local_addr = listener.local_addr()?;

    tokio::spawn(async move {
        let result = tonic::transport::Server::builder()
            .add_service(StorageServiceServer::from_arc(service))
            .serve_with_incoming_shutdown(
                TcpListenerStream::new(listener),
                token.cancelled_owned(),
            )
            .await;
        if let Err(e) = result {
            error!("storage server stopped: {e}");
        }
    });
    info!("start storage server on {}", local_addr);
    Ok(local_addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_only_when_type_set() {
        let mut conf = Config::default();
        assert!(conf.get_database().is_none());
        conf.db_type = Some("memory".into());
        let db = conf.get_database().unwrap();
        assert_eq!(db.r#type, "memory");
        assert_eq!(db.database, "tabgrid");
    }
}
