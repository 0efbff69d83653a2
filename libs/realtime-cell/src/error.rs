use thiserror::Error;

use shared_models::entities::EntityType;
use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RealtimeError {
    #[error("Realtime bus is not running")]
    NotRunning,

    #[error("Could not open change feed for {entity}: {message}")]
    Subscribe { entity: EntityType, message: String },

    #[error("Could not close change feed for {entity}: {message}")]
    Unsubscribe { entity: EntityType, message: String },

    #[error("Unrecognised change payload: {0}")]
    Payload(String),
}

impl From<RealtimeError> for AppError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::NotRunning => AppError::BadRequest(err.to_string()),
            RealtimeError::Payload(_) => AppError::ValidationError(err.to_string()),
            RealtimeError::Subscribe { .. } | RealtimeError::Unsubscribe { .. } => {
                AppError::RemoteOperation(err.to_string())
            }
        }
    }
}
