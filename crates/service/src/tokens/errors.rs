use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("{0}")]
    Validation(String),
    #[error("Token not found")]
    NotFound(Uuid),
}

impl From<models::ModelError> for TokenError {
    fn from(e: models::ModelError) -> Self {
        match e {
            models::ModelError::Validation(msg) => TokenError::Validation(msg),
        }
    }
}
