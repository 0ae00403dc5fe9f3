//! Per-service subscriber lists.
//!
//! Each service owns a `Subscribers` and notifies it synchronously after a
//! mutation has been applied. A failing or panicking subscriber is logged and
//! skipped; the remaining subscribers still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use models::ServiceEvent;
use tracing::{error, warn};

pub type ServiceListener = Arc<dyn Fn(&ServiceEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Anything that publishes `ServiceEvent`s under a fixed service name.
pub trait EventSource: Send + Sync {
    fn service_name(&self) -> &'static str;
    fn subscribe(&self, listener: ServiceListener) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

pub struct Subscribers {
    service: &'static str,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, ServiceListener)>>,
}

impl Subscribers {
    pub fn new(service: &'static str) -> Self {
        Self { service, next_id: AtomicU64::new(1), listeners: Mutex::new(Vec::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, ServiceListener)>> {
        self.listeners.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn subscribe(&self, listener: ServiceListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver to every subscriber in registration order.
    pub fn notify(&self, event: ServiceEvent) {
        // snapshot so listeners may (un)subscribe while being called
        let snapshot: Vec<ServiceListener> = self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(service = self.service, event = %event.event_type, error = %e, "subscriber failed"),
                Err(_) => error!(service = self.service, event = %event.event_type, "subscriber panicked"),
            }
        }
    }
}
