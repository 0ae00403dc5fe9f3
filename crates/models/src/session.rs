use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::Metadata;

const RESERVED: [&str; 2] = ["handle", "timestamp"];

/// Signed-in user. The handle is the only credential that is checked;
/// anything else supplied at sign-in is kept verbatim alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub handle: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub credentials: Metadata,
}

impl Session {
    /// Build a session stamped now. Credential keys that collide with
    /// `handle`/`timestamp` are dropped.
    pub fn new(handle: &str, mut credentials: Metadata) -> Self {
        for key in RESERVED {
            credentials.remove(key);
        }
        Self { handle: handle.trim().to_string(), timestamp: Utc::now(), credentials }
    }
}

/// Validate a handle against length bounds (in chars, after trimming) and
/// the allowed alphabet `[A-Za-z0-9_.-]`.
pub fn validate_handle(handle: &str, min_len: usize, max_len: usize) -> Result<(), ModelError> {
    let h = handle.trim();
    if h.is_empty() {
        return Err(ModelError::Validation("handle required".into()));
    }
    let len = h.chars().count();
    if len < min_len || len > max_len {
        return Err(ModelError::Validation(format!("handle must be {min_len}-{max_len} characters")));
    }
    if !h.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(ModelError::Validation("handle may only contain letters, digits, '_', '.', '-'".into()));
    }
    Ok(())
}
