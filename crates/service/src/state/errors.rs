use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("No transition for {state}:{action}")]
    NoTransition { state: String, action: String },
    /// The handler ran and failed; the state is unchanged.
    #[error("{0}")]
    Handler(String),
}
