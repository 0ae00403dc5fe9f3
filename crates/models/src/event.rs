use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Raw notification a service hands to its own subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

impl ServiceEvent {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self { event_type: event_type.into(), data }
    }
}

/// Normalized envelope queued by the integration listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    pub id: Uuid,
    pub service: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl IntegrationEvent {
    pub fn new(service: impl Into<String>, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            service: service.into(),
            event_type: event_type.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Listener keys this event is offered to, most specific first.
    /// An event whose type is itself `*` collapses the first two keys into one.
    pub fn listener_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(3);
        if self.event_type != "*" {
            keys.push(format!("{}:{}", self.service, self.event_type));
        }
        keys.push(format!("{}:*", self.service));
        keys.push("*".to_string());
        keys
    }
}
