use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Metadata;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from: String,
    pub to: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl HistoryEntry {
    pub fn new(from: &str, to: &str, action: &str, mut metadata: Metadata) -> Self {
        for key in ["from", "to", "action", "timestamp"] {
            metadata.remove(key);
        }
        Self {
            from: from.to_string(),
            to: to.to_string(),
            action: action.to_string(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}
