use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::storage::json_map_store::JsonMapStore;
use crate::storage::KeyValueStore;

/// `KeyValueStore` persisted as one JSON object on disk.
#[derive(Clone)]
pub struct FileKvStore {
    store: Arc<JsonMapStore<String, String>>,
}

impl FileKvStore {
    /// Open (or create) the backing file.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let store = JsonMapStore::<String, String>::new(path).await?;
        Ok(Arc::new(Self { store }))
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Option<String> { self.store.get(&key.to_string()).await }
    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError> { self.store.insert(key.to_string(), value).await }
    async fn remove(&self, key: &str) -> Result<bool, ServiceError> { self.store.remove(&key.to_string()).await }
    async fn keys(&self) -> Vec<String> { self.store.keys().await }
    async fn clear(&self) -> Result<(), ServiceError> { self.store.clear().await }
}
