use serde::{Deserialize, Serialize};

use models::Metadata;

/// Sign-in input. Extra credential fields are stored with the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignInInput {
    pub handle: String,
    #[serde(flatten)]
    pub credentials: Metadata,
}

impl SignInInput {
    pub fn handle(handle: impl Into<String>) -> Self {
        Self { handle: handle.into(), credentials: Metadata::new() }
    }
}
