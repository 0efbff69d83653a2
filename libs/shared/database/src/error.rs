use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A row did not match the typed record it was decoded into.
    #[error("Malformed {table} row: {message}")]
    Decode { table: String, message: String },
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Unauthorized(msg) => AppError::AuthExpired(msg),
            DatabaseError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::RemoteOperation(other.to_string()),
        }
    }
}
