use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum GamificationError {
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("User {user_id} has a role without statistics: {role}")]
    RoleMismatch { user_id: Uuid, role: String },

    #[error("Counter {counter} does not belong to {role} statistics")]
    InvalidData { counter: String, role: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GamificationError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        GamificationError::Storage(err.to_string())
    }

    pub fn external(err: impl std::fmt::Display) -> Self {
        GamificationError::ExternalService(err.to_string())
    }
}

impl From<GamificationError> for AppError {
    fn from(err: GamificationError) -> Self {
        match err {
            GamificationError::UserNotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            GamificationError::RoleMismatch { .. } => AppError::BadRequest(err.to_string()),
            GamificationError::InvalidData { .. } => AppError::ValidationError(err.to_string()),
            GamificationError::Storage(msg) => AppError::Database(msg),
            GamificationError::ExternalService(msg) => AppError::ExternalService(msg),
            GamificationError::Serialization(e) => AppError::Internal(e.to_string()),
        }
    }
}

pub type GamificationResult<T> = Result<T, GamificationError>;
