//! Boots the services from config and wires them together.
//!
//! Loading is tolerant: a missing or unreadable stored value starts that
//! service empty instead of failing startup.

use std::sync::Arc;

use common::ApiResult;
use configs::{AppConfig, StorageBackend};
use models::{Metadata, NewToken, TokenPatch};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{domain::SignInInput, AuthPolicy, AuthService};
use crate::errors::ServiceError;
use crate::events::IntegrationListener;
use crate::state::{StateMachine, Transition};
use crate::storage::{FileKvStore, KeyValueStore, MemoryKvStore, StorageKeys};
use crate::tokens::TokenService;
use crate::wallet::WalletService;

pub const STATE_GUEST: &str = "guest";
pub const STATE_AUTHENTICATED: &str = "authenticated";

#[derive(Debug, Clone, Deserialize)]
struct AmountInput {
    amount: u64,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Clone, Deserialize)]
struct UpdateTokenInput {
    id: Uuid,
    #[serde(flatten)]
    patch: TokenPatch,
}

/// Point-in-time summary for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: String,
    pub handle: Option<String>,
    pub balance: u64,
    pub tokens: usize,
    pub transactions: usize,
    pub events_processed: u64,
}

pub struct Coordinator {
    pub store: Arc<dyn KeyValueStore>,
    pub auth: Arc<AuthService>,
    pub tokens: Arc<TokenService>,
    pub wallet: Arc<WalletService>,
    pub events: Arc<IntegrationListener>,
    pub machine: Arc<StateMachine>,
}

impl Coordinator {
    /// Open the configured store and build everything on top of it.
    pub async fn bootstrap(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let store: Arc<dyn KeyValueStore> = match cfg.storage.backend {
            StorageBackend::File => {
                common::env::ensure_env(&cfg.storage.path).await.map_err(ServiceError::storage)?;
                FileKvStore::new(&cfg.storage.path).await?
            }
            StorageBackend::Memory => MemoryKvStore::new(),
        };
        Ok(Self::with_store(store, cfg).await)
    }

    pub async fn with_store(store: Arc<dyn KeyValueStore>, cfg: &AppConfig) -> Self {
        let keys = StorageKeys::from(&cfg.storage);
        let auth = Arc::new(AuthService::load(Arc::clone(&store), keys.session, AuthPolicy::from(&cfg.auth)).await);
        let tokens = Arc::new(TokenService::load(Arc::clone(&store), keys.tokens).await);
        let wallet = Arc::new(WalletService::load(Arc::clone(&store), keys.transactions).await);

        let events = IntegrationListener::new();
        events.connect(auth.as_ref());
        events.connect(tokens.as_ref());
        events.connect(wallet.as_ref());

        let initial = if auth.is_authenticated().await { STATE_AUTHENTICATED.to_string() } else { cfg.state.initial_state.clone() };
        let machine = Arc::new(StateMachine::new(initial, cfg.state.history_limit).with_events(Arc::clone(&events)));

        let coordinator = Self { store, auth, tokens, wallet, events, machine };
        coordinator.register_default_transitions();
        info!(
            state = %coordinator.machine.current_state(),
            transitions = coordinator.machine.registered_transitions().len(),
            "coordinator ready"
        );
        coordinator
    }

    fn register_default_transitions(&self) {
        let m = &self.machine;

        let auth = Arc::clone(&self.auth);
        m.register(STATE_GUEST, "sign_in", move |ctx| {
            let auth = Arc::clone(&auth);
            async move {
                let input: SignInInput = serde_json::from_value(ctx.payload)?;
                let session = auth.sign_in(input).await?;
                Ok(Transition::to(STATE_AUTHENTICATED)
                    .with_metadata("handle", json!(session.handle))
                    .with_data(json!(session)))
            }
        });

        let auth = Arc::clone(&self.auth);
        m.register(STATE_AUTHENTICATED, "sign_out", move |_ctx| {
            let auth = Arc::clone(&auth);
            async move {
                let ended = auth.sign_out().await?;
                Ok(Transition::to(STATE_GUEST)
                    .with_metadata("handle", json!(ended.handle))
                    .with_data(json!({ "handle": ended.handle })))
            }
        });

        let wallet = Arc::clone(&self.wallet);
        m.register(STATE_AUTHENTICATED, "add_funds", move |ctx| {
            let wallet = Arc::clone(&wallet);
            async move {
                let input: AmountInput = serde_json::from_value(ctx.payload)?;
                let tx = wallet.add_funds(input.amount, input.metadata).await?;
                Ok(Transition::to(STATE_AUTHENTICATED).with_data(json!(tx)))
            }
        });

        let wallet = Arc::clone(&self.wallet);
        m.register(STATE_AUTHENTICATED, "deduct_funds", move |ctx| {
            let wallet = Arc::clone(&wallet);
            async move {
                let input: AmountInput = serde_json::from_value(ctx.payload)?;
                let tx = wallet.deduct_funds(input.amount, input.metadata).await?;
                Ok(Transition::to(STATE_AUTHENTICATED).with_data(json!(tx)))
            }
        });

        let (wallet, tokens) = (Arc::clone(&self.wallet), Arc::clone(&self.tokens));
        m.register(STATE_AUTHENTICATED, "purchase_token", move |ctx| {
            let (wallet, tokens) = (Arc::clone(&wallet), Arc::clone(&tokens));
            async move {
                let input: NewToken = serde_json::from_value(ctx.payload)?;
                let receipt = wallet.purchase_token(&tokens, input).await?;
                Ok(Transition::to(STATE_AUTHENTICATED)
                    .with_metadata("token_id", json!(receipt.token.id))
                    .with_data(json!(receipt)))
            }
        });

        let tokens = Arc::clone(&self.tokens);
        m.register(STATE_AUTHENTICATED, "create_token", move |ctx| {
            let tokens = Arc::clone(&tokens);
            async move {
                let input: NewToken = serde_json::from_value(ctx.payload)?;
                let token = tokens.create_token(input).await?;
                Ok(Transition::to(STATE_AUTHENTICATED).with_data(json!(token)))
            }
        });

        let tokens = Arc::clone(&self.tokens);
        m.register(STATE_AUTHENTICATED, "update_token", move |ctx| {
            let tokens = Arc::clone(&tokens);
            async move {
                let input: UpdateTokenInput = serde_json::from_value(ctx.payload)?;
                let token = tokens.update_token(input.id, input.patch).await?;
                Ok(Transition::to(STATE_AUTHENTICATED).with_data(json!(token)))
            }
        });
    }

    /// Run `action` through the state machine and flatten the outcome.
    #[instrument(skip(self, payload))]
    pub async fn dispatch(&self, action: &str, payload: Value) -> ApiResult<Value> {
        self.machine
            .transition(action, payload)
            .await
            .map(|outcome| json!(outcome))
            .into()
    }

    pub async fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.machine.current_state(),
            handle: self.auth.handle().await,
            balance: self.wallet.balance().await,
            tokens: self.tokens.count().await,
            transactions: self.wallet.transactions().await.len(),
            events_processed: self.events.processed(),
        }
    }
}
