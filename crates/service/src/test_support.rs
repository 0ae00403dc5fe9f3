#![cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use models::ServiceEvent;

use crate::errors::ServiceError;
use crate::storage::{KeyValueStore, MemoryKvStore};
use crate::subscribers::ServiceListener;

/// Store whose writes always fail; reads see nothing.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Option<String> { None }
    async fn set(&self, key: &str, _value: String) -> Result<(), ServiceError> {
        Err(ServiceError::Storage(format!("quota exceeded writing {key}")))
    }
    async fn remove(&self, key: &str) -> Result<bool, ServiceError> {
        Err(ServiceError::Storage(format!("cannot remove {key}")))
    }
    async fn keys(&self) -> Vec<String> { Vec::new() }
    async fn clear(&self) -> Result<(), ServiceError> { Err(ServiceError::Storage("cannot clear".into())) }
}

/// Memory store whose first `set` yields to the scheduler a few times before
/// landing, so a later write can overtake it.
pub struct SlowFirstWrite {
    inner: Arc<MemoryKvStore>,
    first: AtomicBool,
}

impl SlowFirstWrite {
    pub fn new(inner: Arc<MemoryKvStore>) -> Arc<Self> {
        Arc::new(Self { inner, first: AtomicBool::new(true) })
    }
}

#[async_trait]
impl KeyValueStore for SlowFirstWrite {
    async fn get(&self, key: &str) -> Option<String> { self.inner.get(key).await }
    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError> {
        if self.first.swap(false, Ordering::SeqCst) {
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
        }
        self.inner.set(key, value).await
    }
    async fn remove(&self, key: &str) -> Result<bool, ServiceError> { self.inner.remove(key).await }
    async fn keys(&self) -> Vec<String> { self.inner.keys().await }
    async fn clear(&self) -> Result<(), ServiceError> { self.inner.clear().await }
}

/// Listener that records every service event it sees.
pub fn recorder() -> (Arc<Mutex<Vec<ServiceEvent>>>, ServiceListener) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: ServiceListener = Arc::new(move |e: &ServiceEvent| -> anyhow::Result<()> {
        sink.lock().unwrap().push(e.clone());
        Ok(())
    });
    (seen, listener)
}
