use tonic::{Code, Status};

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("gRPC error: {0}")]
    Rpc(Status),
    #[error("gRPC connect error: {0}")]
    Connect(#[from] tonic::transport::Error),
    #[error("Uri parsing error: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),
    #[error("Pool error: {0}")]
    Pool(String),
    #[error("Unsupported database type `{0}`")]
    UnsupportedType(String),
}

impl From<Status> for BackendError {
    fn from(value: Status) -> Self {
        match value.code() {
            Code::NotFound => BackendError::NotFound(value.message().into()),
            _ => BackendError::Rpc(value),
        }
    }
}

impl From<mobc::Error<BackendError>> for BackendError {
    fn from(value: mobc::Error<BackendError>) -> Self {
        match value {
            mobc::Error::Inner(e) => e,
            mobc::Error::Timeout => BackendError::Pool("timeout".into()),
            mobc::Error::BadConn => BackendError::Pool("bad connection".into()),
            mobc::Error::PoolClosed => BackendError::Pool("pool closed".into()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    #[error("Insufficient storage backends: need {required}, have {available}")]
    InsufficientBackends { required: usize, available: usize },
    #[error("No table `{0}` on coordinator")]
    TableNotFound(String),
    #[error("No line `{key}` in table `{table}`")]
    LineNotFound { table: String, key: String },
    #[error("Table `{0}` already exists")]
    AlreadyExists(String),
    #[error("Invalid: {0}")]
    InvalidArgument(String),
    #[error("Remote call to `{addr}` failed: {source}")]
    RemoteCall {
        addr: String,
        #[source]
        source: BackendError,
    },
    #[error("Cannot connect to storage server `{addr}`: {source}")]
    ConnectFailure {
        addr: String,
        #[source]
        source: BackendError,
    },
    #[error("Unsupported database type `{0}`")]
    UnsupportedDatabaseType(String),
}

impl CoordinatorError {
    pub(crate) fn remote(addr: &str, source: BackendError) -> Self {
        match source {
            BackendError::UnsupportedType(t) => {
                CoordinatorError::UnsupportedDatabaseType(t)
            }
            source => CoordinatorError::RemoteCall {
                addr: addr.into(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoordinatorError::TableNotFound(_)
                | CoordinatorError::LineNotFound { .. }
        )
    }
}

impl From<CoordinatorError> for tonic::Status {
    fn from(value: CoordinatorError) -> Self {
        match value {
            CoordinatorError::InsufficientBackends { .. } => {
                Status::failed_precondition(value.to_string())
            }
            CoordinatorError::TableNotFound(_)
            | CoordinatorError::LineNotFound { .. } => {
                Status::not_found(value.to_string())
            }
            CoordinatorError::AlreadyExists(_) => {
                Status::already_exists(value.to_string())
            }
            CoordinatorError::InvalidArgument(msg) => {
                Status::invalid_argument(msg)
            }
            CoordinatorError::UnsupportedDatabaseType(_) => {
                Status::invalid_argument(value.to_string())
            }
            CoordinatorError::RemoteCall {
                source: BackendError::Rpc(status),
                ..
            } => status,
            CoordinatorError::RemoteCall { .. }
            | CoordinatorError::ConnectFailure { .. } => {
                Status::unavailable(value.to_string())
            }
        }
    }
}
