use thiserror::Error;

/// Business errors for auth workflows
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Not signed in")]
    NotSignedIn,
}

impl From<models::ModelError> for AuthError {
    fn from(e: models::ModelError) -> Self {
        match e {
            models::ModelError::Validation(msg) => AuthError::Validation(msg),
        }
    }
}
