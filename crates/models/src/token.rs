use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::Metadata;

const RESERVED: [&str; 5] = ["id", "value", "type", "timestamp", "updated_at"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    /// Monetary value in minor units.
    pub value: u64,
    #[serde(rename = "type")]
    pub token_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

/// Creation input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewToken {
    pub value: u64,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// In-place update. `None` leaves the field untouched; metadata merges by key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenPatch {
    #[serde(default)]
    pub value: Option<u64>,
    #[serde(default, rename = "type")]
    pub token_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl Token {
    pub fn create(input: NewToken) -> Result<Self, ModelError> {
        validate_value(input.value)?;
        validate_type(&input.token_type)?;
        Ok(Self {
            id: Uuid::new_v4(),
            value: input.value,
            token_type: input.token_type.trim().to_string(),
            timestamp: Utc::now(),
            updated_at: None,
            metadata: strip_reserved(input.metadata),
        })
    }

    /// Apply a patch; validates everything before touching `self`.
    pub fn apply(&mut self, patch: TokenPatch) -> Result<(), ModelError> {
        if let Some(v) = patch.value {
            validate_value(v)?;
        }
        if let Some(t) = &patch.token_type {
            validate_type(t)?;
        }
        if let Some(v) = patch.value {
            self.value = v;
        }
        if let Some(t) = patch.token_type {
            self.token_type = t.trim().to_string();
        }
        if let Some(m) = patch.metadata {
            self.metadata.extend(strip_reserved(m));
        }
        self.updated_at = Some(Utc::now());
        Ok(())
    }
}

pub fn validate_value(value: u64) -> Result<(), ModelError> {
    if value == 0 {
        return Err(ModelError::Validation("token value must be positive".into()));
    }
    Ok(())
}

pub fn validate_type(token_type: &str) -> Result<(), ModelError> {
    if token_type.trim().is_empty() {
        return Err(ModelError::Validation("token type required".into()));
    }
    Ok(())
}

fn strip_reserved(mut m: Metadata) -> Metadata {
    for key in RESERVED {
        m.remove(key);
    }
    m
}
