use thiserror::Error;

/// Failures from the key-value layer. Business errors stay in each module's
/// own enum (`AuthError`, `TokenError`, `WalletError`, `StateError`).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn storage(e: impl std::fmt::Display) -> Self { Self::Storage(e.to_string()) }
}
