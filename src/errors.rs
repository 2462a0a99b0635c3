use astra::Response;
use thiserror::Error;

use crate::scan::stores::StoreError;
use crate::scan::ScanError;

/// Errors surfaced by the HTTP layer, mapped to a status code in
/// `responses::errors`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not Found")]
    NotFound,
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database Error: {0}")]
    DbError(String),
    #[error("Scan Failed: {0}")]
    ScanFailed(String),
    #[error("Internal Server Error")]
    Internal,
}

// Type alias commonly used by route handlers.
pub type ResultResp = Result<Response, ServerError>;

impl ServerError {
    pub fn status(&self) -> u16 {
        match self {
            ServerError::NotFound => 404,
            ServerError::BadRequest(_) => 400,
            ServerError::Conflict(_) => 409,
            ServerError::DbError(_) | ServerError::ScanFailed(_) | ServerError::Internal => {
                500
            }
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        ServerError::DbError(e.to_string())
    }
}

impl From<rusqlite::Error> for ServerError {
    fn from(e: rusqlite::Error) -> Self {
        ServerError::DbError(e.to_string())
    }
}

impl From<ScanError> for ServerError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::AlreadyRunning => ServerError::Conflict(e.to_string()),
            other => ServerError::ScanFailed(other.to_string()),
        }
    }
}
