use tonic::Status;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("unsupported database type `{0}`")]
    UnsupportedType(String),
    #[error("cannot connect to database: {0}")]
    ConnectFailure(String),
    #[error("no database registered")]
    NotRegistered,
    #[error("no table `{0}`")]
    NoTable(String),
    #[error("table `{0}` already exists")]
    TableExists(String),
    #[error("no line `{key}` in table `{table}`")]
    NoLine { table: String, key: String },
    #[error("line `{key}` already exists in table `{table}`")]
    LineExists { table: String, key: String },
    #[error("Invalid: {0}")]
    InvalidArgument(String),
}

impl From<StorageError> for tonic::Status {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::UnsupportedType(_)
            | StorageError::InvalidArgument(_) => {
                Status::invalid_argument(value.to_string())
            }
            StorageError::ConnectFailure(_) => {
                Status::unavailable(value.to_string())
            }
            StorageError::NotRegistered => {
                Status::failed_precondition(value.to_string())
            }
            StorageError::NoTable(_) | StorageError::NoLine { .. } => {
                Status::not_found(value.to_string())
            }
            StorageError::TableExists(_) | StorageError::LineExists { .. } => {
                Status::already_exists(value.to_string())
            }
        }
    }
}
