use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use models::{IntegrationEvent, ServiceEvent};
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::subscribers::{EventSource, SubscriptionId};

pub type EventCallback = Arc<dyn Fn(&IntegrationEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Registry = HashMap<String, Vec<(ListenerId, EventCallback)>>;

pub struct IntegrationListener {
    listeners: Mutex<Registry>,
    queue: Mutex<VecDeque<IntegrationEvent>>,
    processing: AtomicBool,
    next_id: AtomicU64,
    processed: AtomicU64,
}

impl Default for IntegrationListener {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            processing: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            processed: AtomicU64::new(0),
        }
    }
}

impl IntegrationListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.listeners.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn pending_queue(&self) -> MutexGuard<'_, VecDeque<IntegrationEvent>> {
        self.queue.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Register `callback` under `pattern` (`service:type`, `service:*` or `*`).
    pub fn on<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&IntegrationEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry().entry(pattern.to_string()).or_default().push((id, Arc::new(callback)));
        debug!(pattern, listener_id = id.0, "listener registered");
        id
    }

    /// Remove a listener; returns whether it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry();
        let mut removed = false;
        for callbacks in registry.values_mut() {
            let before = callbacks.len();
            callbacks.retain(|(lid, _)| *lid != id);
            removed |= callbacks.len() != before;
        }
        registry.retain(|_, callbacks| !callbacks.is_empty());
        removed
    }

    /// Wrap and enqueue an event, then drain unless a drain is already running.
    pub fn emit(&self, service: &str, event_type: &str, data: Value) -> Uuid {
        let event = IntegrationEvent::new(service, event_type, data);
        let id = event.id;
        self.pending_queue().push_back(event);
        self.process_queue();
        id
    }

    /// Forward every event raised by `source` into this listener.
    pub fn connect(self: &Arc<Self>, source: &dyn EventSource) -> SubscriptionId {
        let service = source.service_name();
        let weak = Arc::downgrade(self);
        source.subscribe(Arc::new(move |event: &ServiceEvent| -> anyhow::Result<()> {
            if let Some(listener) = weak.upgrade() {
                listener.emit(service, &event.event_type, event.data.clone());
            }
            Ok(())
        }))
    }

    pub fn pending(&self) -> usize {
        self.pending_queue().len()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn listener_count(&self) -> usize {
        self.registry().values().map(Vec::len).sum()
    }

    fn process_queue(&self) {
        loop {
            if self.processing.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
                return;
            }
            while let Some(event) = self.next_event() {
                self.dispatch(&event);
            }
            self.processing.store(false, Ordering::Release);
            // an emit may have slipped in between the last pop and the flag reset
            if self.pending() == 0 {
                return;
            }
        }
    }

    fn next_event(&self) -> Option<IntegrationEvent> {
        self.pending_queue().pop_front()
    }

    fn dispatch(&self, event: &IntegrationEvent) {
        // listeners added while this event is being delivered start with the next one
        let targets: Vec<(String, Vec<EventCallback>)> = {
            let registry = self.registry();
            event
                .listener_keys()
                .into_iter()
                .filter_map(|key| {
                    let cbs = registry.get(&key)?;
                    Some((key, cbs.iter().map(|(_, cb)| Arc::clone(cb)).collect()))
                })
                .collect()
        };
        let mut delivered = 0usize;
        for (key, callbacks) in targets {
            for callback in callbacks {
                delivered += 1;
                match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(event_id = %event.id, key = %key, error = %e, "listener failed"),
                    Err(_) => error!(event_id = %event.id, key = %key, "listener panicked"),
                }
            }
        }
        self.processed.fetch_add(1, Ordering::Relaxed);
        debug!(
            event_id = %event.id,
            service = %event.service,
            event_type = %event.event_type,
            delivered,
            "event dispatched"
        );
    }
}
