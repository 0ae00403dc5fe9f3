//! Storage abstractions for service layer
//!
//! A small key-value contract (string keys, string values) with a file-backed
//! and an in-memory implementation. Services keep whole collections under one
//! key each, serialized as JSON.

pub mod json_map_store;
pub mod file_kv;
pub mod memory;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::errors::ServiceError;

pub use file_kv::FileKvStore;
pub use memory::MemoryKvStore;

/// Synchronous-semantics key-value store in the shape of browser local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError>;
    async fn remove(&self, key: &str) -> Result<bool, ServiceError>;
    async fn keys(&self) -> Vec<String>;
    async fn clear(&self) -> Result<(), ServiceError>;
}

/// The three keys the services persist under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub session: String,
    pub tokens: String,
    pub transactions: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::from(&configs::StorageConfig::default())
    }
}

impl From<&configs::StorageConfig> for StorageKeys {
    fn from(cfg: &configs::StorageConfig) -> Self {
        Self {
            session: cfg.session_key.clone(),
            tokens: cfg.tokens_key.clone(),
            transactions: cfg.transactions_key.clone(),
        }
    }
}

/// Read and decode a JSON value. A corrupt value is logged and treated as absent.
pub async fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, error = %e, "discarding unreadable stored value");
            None
        }
    }
}

/// Encode and store a JSON value.
pub async fn write_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), ServiceError> {
    let raw = serde_json::to_string(value).map_err(ServiceError::storage)?;
    store.set(key, raw).await
}
