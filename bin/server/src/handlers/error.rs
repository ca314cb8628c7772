use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::ErrorResponse;
use drive::{ErrorKind, StorageError};
use std::fmt;
use tracing::{error, warn};

/// HTTP wrapper around a storage error
#[derive(Debug)]
pub struct ApiError(StorageError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.0.root_cause();
        if std::ptr::eq(root, &self.0) {
            write!(f, "{}", self.0)
        } else {
            write!(f, "{}: {}", self.0, root)
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::InvalidPath | ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::OperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            message: self.to_string(),
        })
    }
}

/// Helper function for storage errors; client mistakes are logged as warnings
pub fn handle_storage_error(msg: &str, e: StorageError) -> actix_web::Error {
    match e.kind() {
        ErrorKind::OperationFailed | ErrorKind::StoreUnavailable => error!("{}: {}", msg, e),
        _ => warn!("{}: {}", msg, e),
    }
    ApiError(e).into()
}

/// Helper function for authentication errors
pub fn handle_auth_error<E: fmt::Display>(msg: &str, e: E) -> actix_web::Error {
    warn!("{}: {}", msg, e);
    actix_web::error::ErrorUnauthorized(format!("{}: {}", msg, e))
}

/// Helper function for server errors
pub fn handle_server_error<E: fmt::Display>(msg: &str, e: E) -> actix_web::Error {
    error!("{}: {}", msg, e);
    actix_web::error::ErrorInternalServerError(format!("{}: {}", msg, e))
}
