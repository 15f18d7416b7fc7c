mod memory;

pub use memory::MemoryConnector;
use tabgrid_pb::{Database, DeleteLineRequest, GetLineRequest, Line, Table};

use crate::error::StorageError;

/// A concrete database a storage server writes its partitions into.
#[async_trait::async_trait]
pub trait DbConnector: Send + Sync {
    async fn connect(&self, db: &Database) -> Result<(), StorageError>;

    async fn disconnect(&self) -> Result<(), StorageError>;

    async fn create_table(&self, table: Table) -> Result<(), StorageError>;

    async fn delete_table(&self, name: &str) -> Result<(), StorageError>;

    async fn insert_line(&self, line: Line) -> Result<(), StorageError>;

    async fn delete_line(
        &self,
        request: DeleteLineRequest,
    ) -> Result<(), StorageError>;

    async fn update_line(&self, line: Line) -> Result<(), StorageError>;

    async fn get_line(
        &self,
        request: GetLineRequest,
    ) -> Result<Line, StorageError>;
}

/// Picks the connector implementation for a database type.
pub fn create_connector(
    db_type: &str,
) -> Result<Box<dyn DbConnector>, StorageError> {
    match db_type.to_lowercase().as_str() {
        "memory" => Ok(Box::new(MemoryConnector::new())),
        _ => Err(StorageError::UnsupportedType(db_type.into())),
    }
}
