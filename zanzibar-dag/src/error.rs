use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagError {
    /// Missing or malformed vertex/tuple fields, or a reserved delimiter
    /// inside a field. The caller must fix the request.
    #[error("Request body error: {0}")]
    RequestBody(String),

    /// The write would close a cycle in the relation graph.
    #[error("Cycle detected: {0}")]
    GraphCycle(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("previous page state not found")]
    PageStateNotFound,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl DagError {
    /// True for errors caused by the request itself rather than the store.
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::RequestBody(_) | Self::GraphCycle(_))
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }
}

impl From<config::ConfigError> for DagError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DagError>;
