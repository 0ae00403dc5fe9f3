use std::collections::HashMap;
use std::sync::Arc;

use models::{NewToken, ServiceEvent, Token, TokenPatch};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::errors::TokenError;
use crate::storage::{read_json, write_json, KeyValueStore};
use crate::subscribers::{EventSource, ServiceListener, SubscriptionId, Subscribers};

pub const SERVICE_NAME: &str = "tokens";

/// Token records keyed by id. Records are created and updated, never removed.
pub struct TokenService {
    store: Arc<dyn KeyValueStore>,
    key: String,
    tokens: RwLock<HashMap<Uuid, Token>>,
    subscribers: Subscribers,
}

impl TokenService {
    pub async fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let tokens: HashMap<Uuid, Token> = read_json(store.as_ref(), &key).await.unwrap_or_default();
        info!(count = tokens.len(), "tokens loaded");
        Self { store, key, tokens: RwLock::new(tokens), subscribers: Subscribers::new(SERVICE_NAME) }
    }

    #[instrument(skip(self, input), fields(value = input.value, token_type = %input.token_type))]
    pub async fn create_token(&self, input: NewToken) -> Result<Token, TokenError> {
        let token = Token::create(input)?;
        {
            // guard held through the write so stored snapshots land in mutation order
            let mut tokens = self.tokens.write().await;
            tokens.insert(token.id, token.clone());
            self.persist(&tokens).await;
        }

        info!(token_id = %token.id, "token_created");
        self.subscribers.notify(ServiceEvent::new("token_created", json!(token)));
        Ok(token)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_token(&self, id: Uuid, patch: TokenPatch) -> Result<Token, TokenError> {
        let token = {
            let mut tokens = self.tokens.write().await;
            let token = tokens.get_mut(&id).ok_or(TokenError::NotFound(id))?;
            token.apply(patch)?;
            let updated = token.clone();
            self.persist(&tokens).await;
            updated
        };

        info!(token_id = %id, "token_updated");
        self.subscribers.notify(ServiceEvent::new("token_updated", json!(token)));
        Ok(token)
    }

    pub async fn get_token(&self, id: Uuid) -> Option<Token> {
        self.tokens.read().await.get(&id).cloned()
    }

    /// All tokens, oldest first.
    pub async fn list_tokens(&self) -> Vec<Token> {
        let mut all: Vec<Token> = self.tokens.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub async fn tokens_by_type(&self, token_type: &str) -> Vec<Token> {
        let mut matching = self.list_tokens().await;
        let token_type = token_type.trim();
        matching.retain(|t| t.token_type == token_type);
        matching
    }

    pub async fn total_value(&self) -> u128 {
        self.tokens.read().await.values().map(|t| t.value as u128).sum()
    }

    pub async fn count(&self) -> usize {
        self.tokens.read().await.len()
    }

    async fn persist(&self, tokens: &HashMap<Uuid, Token>) {
        if let Err(e) = write_json(self.store.as_ref(), &self.key, tokens).await {
            error!(key = %self.key, error = %e, "failed to persist tokens");
        }
    }
}

impl EventSource for TokenService {
    fn service_name(&self) -> &'static str { SERVICE_NAME }
    fn subscribe(&self, listener: ServiceListener) -> SubscriptionId { self.subscribers.subscribe(listener) }
    fn unsubscribe(&self, id: SubscriptionId) -> bool { self.subscribers.unsubscribe(id) }
}
