use common::path_utils::PathError;
use storage::StoreError;
use thiserror::Error;

/// Coarse classification of a `StorageError`, used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    NotFound,
    AlreadyExists,
    BadRequest,
    OperationFailed,
    StoreUnavailable,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("{message}")]
    OperationFailed {
        message: String,
        #[source]
        cause: Option<Box<StorageError>>,
    },
    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),
}

impl StorageError {
    pub fn operation_failed(message: impl Into<String>) -> Self {
        StorageError::OperationFailed {
            message: message.into(),
            cause: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::InvalidPath(_) => ErrorKind::InvalidPath,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StorageError::BadRequest(_) => ErrorKind::BadRequest,
            StorageError::OperationFailed { .. } => ErrorKind::OperationFailed,
            StorageError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// Innermost error of an `OperationFailed` chain (or `self`)
    pub fn root_cause(&self) -> &StorageError {
        let mut current = self;
        while let StorageError::OperationFailed {
            cause: Some(cause), ..
        } = current
        {
            current = cause;
        }
        current
    }
}

impl From<StoreError> for StorageError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => StorageError::NotFound(key),
            StoreError::Unavailable(msg) => StorageError::StoreUnavailable(msg),
        }
    }
}

impl From<PathError> for StorageError {
    fn from(e: PathError) -> Self {
        StorageError::InvalidPath(e.message().to_string())
    }
}
