use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};

use models::{HistoryEntry, Metadata};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::errors::StateError;
use super::{transition_key, DEFAULT_HISTORY_LIMIT};
use crate::events::IntegrationListener;

pub const SERVICE_NAME: &str = "state";

/// What a handler receives.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub state: String,
    pub action: String,
    pub payload: Value,
}

/// What a handler returns. `next_state: None` means "stay, record nothing".
#[derive(Debug, Clone, Default)]
pub struct Transition {
    pub next_state: Option<String>,
    pub data: Value,
    pub metadata: Metadata,
}

impl Transition {
    pub fn to(state: impl Into<String>) -> Self {
        Self { next_state: Some(state.into()), ..Default::default() }
    }

    pub fn stay() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub action: String,
    pub from: String,
    pub to: String,
    pub data: Value,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Transition>> + Send>>;
pub type TransitionHandler = Arc<dyn Fn(ActionContext) -> HandlerFuture + Send + Sync>;

pub struct StateMachine {
    state: RwLock<String>,
    handlers: RwLock<HashMap<String, TransitionHandler>>,
    history: Mutex<VecDeque<HistoryEntry>>,
    history_limit: usize,
    events: Option<Arc<IntegrationListener>>,
}

impl StateMachine {
    pub fn new(initial_state: impl Into<String>, history_limit: usize) -> Self {
        Self {
            state: RwLock::new(initial_state.into()),
            handlers: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            history_limit: history_limit.max(1),
            events: None,
        }
    }

    /// Announce every state change as a `state:transition` integration event.
    pub fn with_events(mut self, events: Arc<IntegrationListener>) -> Self {
        self.events = Some(events);
        self
    }

    /// Register (or replace) the handler for `state` + `action`.
    pub fn register<F, Fut>(&self, state: &str, action: &str, handler: F)
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Transition>> + Send + 'static,
    {
        let key = transition_key(state, action);
        let boxed: TransitionHandler = Arc::new(move |ctx| Box::pin(handler(ctx)) as HandlerFuture);
        let replaced = self.handlers.write().unwrap_or_else(|p| p.into_inner()).insert(key.clone(), boxed);
        if replaced.is_some() {
            debug!(%key, "transition handler replaced");
        }
    }

    pub fn current_state(&self) -> String {
        self.state.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Whether `action` has a handler in the current state.
    pub fn can(&self, action: &str) -> bool {
        let key = transition_key(&self.current_state(), action);
        self.handlers.read().unwrap_or_else(|p| p.into_inner()).contains_key(&key)
    }

    /// Actions registered for the current state, sorted.
    pub fn available_actions(&self) -> Vec<String> {
        let prefix = format!("{}:", self.current_state());
        let handlers = self.handlers.read().unwrap_or_else(|p| p.into_inner());
        let mut actions: Vec<String> = handlers
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect();
        actions.sort();
        actions
    }

    /// Every registered `state:action` key, sorted.
    pub fn registered_transitions(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handlers.read().unwrap_or_else(|p| p.into_inner()).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Oldest first; at most `history_limit` entries.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().unwrap_or_else(|p| p.into_inner()).iter().cloned().collect()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Run the handler for `action` in the current state.
    ///
    /// Fails closed: an unregistered pair is an error, and a failing handler
    /// leaves the state and history untouched.
    #[instrument(skip(self, payload))]
    pub async fn transition(&self, action: &str, payload: Value) -> Result<TransitionOutcome, StateError> {
        let from = self.current_state();
        let key = transition_key(&from, action);
        let handler = self.handlers.read().unwrap_or_else(|p| p.into_inner()).get(&key).cloned();
        let Some(handler) = handler else {
            warn!(%key, "no transition registered");
            return Err(StateError::NoTransition { state: from, action: action.to_string() });
        };

        let ctx = ActionContext { state: from.clone(), action: action.to_string(), payload };
        let result = handler(ctx).await.map_err(|e| {
            warn!(%key, error = %e, "transition handler failed");
            StateError::Handler(e.to_string())
        })?;

        let Some(to) = result.next_state else {
            return Ok(TransitionOutcome { action: action.to_string(), to: from.clone(), from, data: result.data });
        };

        *self.state.write().unwrap_or_else(|p| p.into_inner()) = to.clone();
        self.record(HistoryEntry::new(&from, &to, action, result.metadata));
        info!(%from, %to, action, "state transition");

        if let Some(events) = &self.events {
            events.emit(
                SERVICE_NAME,
                "transition",
                json!({ "from": from, "to": to, "action": action, "data": result.data }),
            );
        }
        Ok(TransitionOutcome { action: action.to_string(), from, to, data: result.data })
    }

    fn record(&self, entry: HistoryEntry) {
        let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history.push_back(entry);
        while history.len() > self.history_limit {
            history.pop_front();
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new("idle", DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn door() -> StateMachine {
        let m = StateMachine::new("closed", DEFAULT_HISTORY_LIMIT);
        m.register("closed", "open", |_ctx| async { Ok(Transition::to("open")) });
        m.register("open", "close", |_ctx| async { Ok(Transition::to("closed")) });
        m.register("open", "peek", |ctx| async move { Ok(Transition::stay().with_data(ctx.payload)) });
        m
    }

    #[tokio::test]
    async fn unregistered_pair_fails_closed() {
        let m = door();
        let err = m.transition("close", Value::Null).await.unwrap_err();
        assert_eq!(err, StateError::NoTransition { state: "closed".into(), action: "close".into() });
        assert_eq!(err.to_string(), "No transition for closed:close");
        assert_eq!(m.current_state(), "closed");
        assert!(m.history().is_empty());
    }

    #[tokio::test]
    async fn transitions_update_state_and_history() -> Result<(), anyhow::Error> {
        let m = door();
        let out = m.transition("open", Value::Null).await?;
        assert_eq!((out.from.as_str(), out.to.as_str()), ("closed", "open"));
        assert_eq!(m.available_actions(), vec!["close", "peek"]);
        assert!(m.can("peek"));
        assert!(!m.can("open"));

        let peek = m.transition("peek", json!({"x": 1})).await?;
        assert_eq!(peek.to, "open");
        assert_eq!(peek.data, json!({"x": 1}));
        assert_eq!(m.history().len(), 1);

        m.transition("close", Value::Null).await?;
        let h = m.history();
        assert_eq!(h.len(), 2);
        assert_eq!((h[1].from.as_str(), h[1].to.as_str(), h[1].action.as_str()), ("open", "closed", "close"));
        Ok(())
    }

    #[tokio::test]
    async fn handler_error_leaves_state_alone() {
        let m = StateMachine::new("a", 10);
        m.register("a", "go", |_ctx| async { Err(anyhow::anyhow!("Insufficient funds")) });
        let err = m.transition("go", Value::Null).await.unwrap_err();
        assert_eq!(err, StateError::Handler("Insufficient funds".into()));
        assert_eq!(m.current_state(), "a");
        assert!(m.history().is_empty());
    }

    #[tokio::test]
    async fn history_is_bounded_oldest_first_out() -> Result<(), anyhow::Error> {
        let m = StateMachine::new("s0", DEFAULT_HISTORY_LIMIT);
        let n = Arc::new(AtomicUsize::new(0));
        for s in ["s0", "s1"] {
            let n = Arc::clone(&n);
            let next = if s == "s0" { "s1" } else { "s0" };
            m.register(s, "flip", move |_ctx| {
                let i = n.fetch_add(1, Ordering::SeqCst);
                async move { Ok(Transition::to(next).with_metadata("seq", json!(i))) }
            });
        }
        for _ in 0..150 {
            m.transition("flip", Value::Null).await?;
        }
        let h = m.history();
        assert_eq!(h.len(), 100);
        assert_eq!(h[0].metadata["seq"], 50);
        assert_eq!(h[99].metadata["seq"], 149);
        Ok(())
    }

    #[tokio::test]
    async fn state_changes_are_announced() -> Result<(), anyhow::Error> {
        let events = IntegrationListener::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        events.on("state:transition", move |e: &models::IntegrationEvent| -> anyhow::Result<()> {
            sink.lock().unwrap().push(e.data.clone());
            Ok(())
        });

        let m = StateMachine::new("closed", 5).with_events(Arc::clone(&events));
        m.register("closed", "open", |_ctx| async { Ok(Transition::to("open")) });
        m.register("open", "peek", |_ctx| async { Ok(Transition::stay()) });
        m.transition("open", Value::Null).await?;
        m.transition("peek", Value::Null).await?;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["from"], "closed");
        assert_eq!(seen[0]["to"], "open");
        assert_eq!(seen[0]["action"], "open");
        Ok(())
    }

    #[test]
    fn zero_limit_is_raised_to_one() {
        assert_eq!(StateMachine::new("x", 0).history_limit(), 1);
    }
}
