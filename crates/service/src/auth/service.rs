use std::sync::Arc;

use models::session::validate_handle;
use models::{ServiceEvent, Session};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use super::domain::SignInInput;
use super::errors::AuthError;
use crate::storage::{read_json, KeyValueStore};
use crate::subscribers::{EventSource, ServiceListener, SubscriptionId, Subscribers};

pub const SERVICE_NAME: &str = "auth";

/// Handle acceptance rules
#[derive(Clone, Debug)]
pub struct AuthPolicy {
    pub handle_min_len: usize,
    pub handle_max_len: usize,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self::from(&configs::AuthConfig::default())
    }
}

impl From<&configs::AuthConfig> for AuthPolicy {
    fn from(cfg: &configs::AuthConfig) -> Self {
        Self { handle_min_len: cfg.handle_min_len, handle_max_len: cfg.handle_max_len }
    }
}

/// Session service independent of any front end
pub struct AuthService {
    store: Arc<dyn KeyValueStore>,
    key: String,
    policy: AuthPolicy,
    session: RwLock<Option<Session>>,
    subscribers: Subscribers,
}

impl AuthService {
    /// Restore the stored session, if any. Called once at startup.
    pub async fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>, policy: AuthPolicy) -> Self {
        let key = key.into();
        let session: Option<Session> = read_json(store.as_ref(), &key).await;
        match &session {
            Some(s) => info!(handle = %s.handle, "session restored"),
            None => debug!("no stored session"),
        }
        Self { store, key, policy, session: RwLock::new(session), subscribers: Subscribers::new(SERVICE_NAME) }
    }

    /// Start a session for `input.handle`, replacing any current one.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{AuthService, AuthPolicy, domain::SignInInput};
    /// use service::storage::MemoryKvStore;
    /// let store = MemoryKvStore::new();
    /// let svc = tokio_test::block_on(AuthService::load(store, "session", AuthPolicy::default()));
    /// let session = tokio_test::block_on(svc.sign_in(SignInInput::handle("alice"))).unwrap();
    /// assert_eq!(session.handle, "alice");
    /// assert!(tokio_test::block_on(svc.is_authenticated()));
    /// ```
    #[instrument(skip(self, input), fields(handle = %input.handle))]
    pub async fn sign_in(&self, input: SignInInput) -> Result<Session, AuthError> {
        validate_handle(&input.handle, self.policy.handle_min_len, self.policy.handle_max_len)?;
        let session = Session::new(&input.handle, input.credentials);

        let previous = {
            let mut current = self.session.write().await;
            let previous = current.replace(session.clone());
            self.persist(Some(&session)).await;
            previous
        };

        info!(handle = %session.handle, "signed_in");
        self.subscribers.notify(ServiceEvent::new(
            "signed_in",
            json!({
                "handle": session.handle,
                "previous": previous.map(|p| p.handle),
            }),
        ));
        Ok(session)
    }

    /// End the current session.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<Session, AuthError> {
        let ended = {
            let mut current = self.session.write().await;
            let ended = current.take().ok_or(AuthError::NotSignedIn)?;
            self.persist(None).await;
            ended
        };

        info!(handle = %ended.handle, "signed_out");
        self.subscribers.notify(ServiceEvent::new("signed_out", json!({ "handle": ended.handle })));
        Ok(ended)
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    pub async fn handle(&self) -> Option<String> {
        self.session.read().await.as_ref().map(|s| s.handle.clone())
    }

    async fn persist(&self, session: Option<&Session>) {
        let res = match session {
            Some(s) => crate::storage::write_json(self.store.as_ref(), &self.key, s).await,
            None => self.store.remove(&self.key).await.map(|_| ()),
        };
        if let Err(e) = res {
            error!(key = %self.key, error = %e, "failed to persist session");
        }
    }
}

impl EventSource for AuthService {
    fn service_name(&self) -> &'static str { SERVICE_NAME }
    fn subscribe(&self, listener: ServiceListener) -> SubscriptionId { self.subscribers.subscribe(listener) }
    fn unsubscribe(&self, id: SubscriptionId) -> bool { self.subscribers.unsubscribe(id) }
}
