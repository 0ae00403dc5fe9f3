use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::ServiceError;
use crate::storage::KeyValueStore;

/// Process-local store; contents vanish with the process.
#[derive(Default)]
pub struct MemoryKvStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError> {
        self.inner.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, ServiceError> {
        Ok(self.inner.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }

    async fn clear(&self) -> Result<(), ServiceError> {
        self.inner.write().await.clear();
        Ok(())
    }
}
