use std::sync::Arc;

use models::{Metadata, NewToken, ServiceEvent, Token, Transaction, TransactionKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use super::errors::WalletError;
use crate::storage::{read_json, write_json, KeyValueStore};
use crate::subscribers::{EventSource, ServiceListener, SubscriptionId, Subscribers};
use crate::tokens::TokenService;

pub const SERVICE_NAME: &str = "wallet";

/// Result of a successful `purchase_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub token: Token,
    pub transaction: Transaction,
}

struct Ledger {
    balance: u64,
    transactions: Vec<Transaction>,
}

/// Balance plus append-only transaction history.
///
/// Only the transaction list is stored; the balance is recomputed from it on
/// load and tracked incrementally afterwards.
pub struct WalletService {
    store: Arc<dyn KeyValueStore>,
    key: String,
    ledger: RwLock<Ledger>,
    subscribers: Subscribers,
}

impl WalletService {
    pub async fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let transactions: Vec<Transaction> = read_json(store.as_ref(), &key).await.unwrap_or_default();
        let balance = replay_balance(&transactions);
        info!(balance, transactions = transactions.len(), "wallet loaded");
        Self {
            store,
            key,
            ledger: RwLock::new(Ledger { balance, transactions }),
            subscribers: Subscribers::new(SERVICE_NAME),
        }
    }

    pub async fn balance(&self) -> u64 {
        self.ledger.read().await.balance
    }

    /// Full history in call order.
    pub async fn transactions(&self) -> Vec<Transaction> {
        self.ledger.read().await.transactions.clone()
    }

    pub async fn transactions_by_type(&self, kind: TransactionKind) -> Vec<Transaction> {
        let ledger = self.ledger.read().await;
        ledger.transactions.iter().filter(|t| t.kind == kind).cloned().collect()
    }

    /// Last `n` transactions, oldest first.
    pub async fn recent_transactions(&self, n: usize) -> Vec<Transaction> {
        let ledger = self.ledger.read().await;
        let start = ledger.transactions.len().saturating_sub(n);
        ledger.transactions[start..].to_vec()
    }

    #[instrument(skip(self, metadata))]
    pub async fn add_funds(&self, amount: u64, metadata: Metadata) -> Result<Transaction, WalletError> {
        let tx = self.append(TransactionKind::Credit, amount, metadata).await?;
        info!(tx_id = %tx.id, balance = tx.balance_after, "funds_added");
        self.subscribers.notify(ServiceEvent::new("funds_added", json!(tx)));
        Ok(tx)
    }

    #[instrument(skip(self, metadata))]
    pub async fn deduct_funds(&self, amount: u64, metadata: Metadata) -> Result<Transaction, WalletError> {
        let tx = self.append(TransactionKind::Debit, amount, metadata).await?;
        info!(tx_id = %tx.id, balance = tx.balance_after, "funds_deducted");
        self.subscribers.notify(ServiceEvent::new("funds_deducted", json!(tx)));
        Ok(tx)
    }

    /// Pay `input.value` and mint the token. If minting fails the debit is
    /// compensated by a refund credit of the same amount.
    ///
    /// # Examples
    /// ```
    /// use service::storage::MemoryKvStore;
    /// use service::tokens::TokenService;
    /// use service::wallet::WalletService;
    /// use models::{Metadata, NewToken};
    /// let store = MemoryKvStore::new();
    /// let tokens = tokio_test::block_on(TokenService::load(store.clone(), "tokens"));
    /// let wallet = tokio_test::block_on(WalletService::load(store, "transactions"));
    /// tokio_test::block_on(wallet.add_funds(100, Metadata::new())).unwrap();
    /// let input = NewToken { value: 30, token_type: "gold".into(), metadata: Metadata::new() };
    /// let receipt = tokio_test::block_on(wallet.purchase_token(&tokens, input)).unwrap();
    /// assert_eq!(receipt.token.value, 30);
    /// assert_eq!(tokio_test::block_on(wallet.balance()), 70);
    /// ```
    #[instrument(skip(self, tokens, input), fields(value = input.value, token_type = %input.token_type))]
    pub async fn purchase_token(&self, tokens: &TokenService, input: NewToken) -> Result<PurchaseReceipt, WalletError> {
        let amount = input.value;
        let mut meta = Metadata::new();
        meta.insert("reason".into(), json!("token_purchase"));
        meta.insert("token_type".into(), json!(input.token_type));
        let debit = self.deduct_funds(amount, meta).await?;

        match tokens.create_token(input).await {
            Ok(token) => {
                info!(token_id = %token.id, tx_id = %debit.id, "token_purchased");
                let receipt = PurchaseReceipt { token, transaction: debit };
                self.subscribers.notify(ServiceEvent::new("token_purchased", json!(receipt)));
                Ok(receipt)
            }
            Err(e) => {
                warn!(tx_id = %debit.id, error = %e, "token creation failed, refunding");
                let mut refund = Metadata::new();
                refund.insert("reason".into(), json!("refund"));
                refund.insert("refund_of".into(), json!(debit.id));
                if let Err(re) = self.add_funds(amount, refund).await {
                    error!(tx_id = %debit.id, error = %re, "refund failed");
                }
                Err(WalletError::Purchase(e))
            }
        }
    }

    async fn append(&self, kind: TransactionKind, amount: u64, metadata: Metadata) -> Result<Transaction, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount);
        }
        let mut ledger = self.ledger.write().await;
        let balance_after = match kind {
            TransactionKind::Credit => ledger.balance.checked_add(amount).ok_or(WalletError::Overflow)?,
            TransactionKind::Debit => ledger
                .balance
                .checked_sub(amount)
                .ok_or(WalletError::InsufficientFunds { balance: ledger.balance, requested: amount })?,
        };
        let tx = Transaction::new(kind, amount, balance_after, metadata);
        ledger.balance = balance_after;
        ledger.transactions.push(tx.clone());
        // persisted under the ledger lock so stored order matches append order
        if let Err(e) = write_json(self.store.as_ref(), &self.key, &ledger.transactions).await {
            error!(key = %self.key, error = %e, "failed to persist transactions");
        }
        Ok(tx)
    }
}

fn replay_balance(transactions: &[Transaction]) -> u64 {
    let sum: i128 = transactions.iter().map(Transaction::delta).sum();
    if sum < 0 {
        warn!(sum, "stored ledger sums below zero, clamping balance to 0");
        return 0;
    }
    u64::try_from(sum).unwrap_or_else(|_| {
        warn!(sum, "stored ledger exceeds u64, clamping balance");
        u64::MAX
    })
}

impl EventSource for WalletService {
    fn service_name(&self) -> &'static str { SERVICE_NAME }
    fn subscribe(&self, listener: ServiceListener) -> SubscriptionId { self.subscribers.subscribe(listener) }
    fn unsubscribe(&self, id: SubscriptionId) -> bool { self.subscribers.unsubscribe(id) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use crate::test_support::{recorder, SlowFirstWrite};
    use crate::tokens::errors::TokenError;

    async fn wallet() -> (Arc<MemoryKvStore>, WalletService) {
        let store = MemoryKvStore::new();
        let w = WalletService::load(store.clone(), "transactions").await;
        (store, w)
    }

    #[tokio::test]
    async fn deduct_beyond_balance_fails() -> Result<(), anyhow::Error> {
        let (_, w) = wallet().await;
        w.add_funds(50, Metadata::new()).await?;

        let err = w.deduct_funds(51, Metadata::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Insufficient funds");
        assert_eq!(w.balance().await, 50);
        assert_eq!(w.transactions().await.len(), 1);

        w.deduct_funds(50, Metadata::new()).await?;
        assert_eq!(w.balance().await, 0);
        assert!(w.deduct_funds(1, Metadata::new()).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn overlapping_appends_persist_in_call_order() -> Result<(), anyhow::Error> {
        let inner = MemoryKvStore::new();
        let w = WalletService::load(SlowFirstWrite::new(inner.clone()), "transactions").await;

        let (a, b) = tokio::join!(w.add_funds(10, Metadata::new()), w.add_funds(5, Metadata::new()));
        let (a, b) = (a?, b?);

        let reloaded = WalletService::load(inner, "transactions").await;
        let ids: Vec<_> = reloaded.transactions().await.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(reloaded.balance().await, 15);
        Ok(())
    }

    #[tokio::test]
    async fn zero_amounts_rejected() {
        let (_, w) = wallet().await;
        assert_eq!(w.add_funds(0, Metadata::new()).await.unwrap_err(), WalletError::InvalidAmount);
        assert_eq!(w.deduct_funds(0, Metadata::new()).await.unwrap_err(), WalletError::InvalidAmount);
        assert!(w.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn credit_overflow_rejected() -> Result<(), anyhow::Error> {
        let (_, w) = wallet().await;
        w.add_funds(u64::MAX, Metadata::new()).await?;
        assert_eq!(w.add_funds(1, Metadata::new()).await.unwrap_err(), WalletError::Overflow);
        assert_eq!(w.balance().await, u64::MAX);
        Ok(())
    }

    #[tokio::test]
    async fn history_is_append_only_in_call_order() -> Result<(), anyhow::Error> {
        let (store, w) = wallet().await;
        let a = w.add_funds(10, Metadata::new()).await?;
        let b = w.deduct_funds(3, Metadata::new()).await?;
        let c = w.add_funds(5, Metadata::new()).await?;

        let ids: Vec<_> = w.transactions().await.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
        assert_eq!(c.balance_after, 12);
        assert_eq!(w.recent_transactions(2).await.iter().map(|t| t.id).collect::<Vec<_>>(), vec![b.id, c.id]);
        assert_eq!(w.transactions_by_type(TransactionKind::Debit).await.len(), 1);

        let reloaded = WalletService::load(store, "transactions").await;
        assert_eq!(reloaded.balance().await, 12);
        assert_eq!(reloaded.transactions().await, w.transactions().await);
        Ok(())
    }

    #[tokio::test]
    async fn purchase_rolls_back_when_token_creation_fails() -> Result<(), anyhow::Error> {
        let (store, w) = wallet().await;
        let tokens = TokenService::load(store, "tokens").await;
        w.add_funds(100, Metadata::new()).await?;

        let bad = NewToken { value: 40, token_type: "   ".into(), metadata: Metadata::new() };
        let err = w.purchase_token(&tokens, bad).await.unwrap_err();
        assert!(matches!(err, WalletError::Purchase(TokenError::Validation(_))));

        assert_eq!(w.balance().await, 100);
        assert_eq!(tokens.count().await, 0);
        let txs = w.transactions().await;
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[1].kind, TransactionKind::Debit);
        assert_eq!(txs[2].kind, TransactionKind::Credit);
        assert_eq!(txs[2].amount, 40);
        assert_eq!(txs[2].metadata["reason"], "refund");
        assert_eq!(txs[2].metadata["refund_of"], json!(txs[1].id));
        Ok(())
    }

    #[tokio::test]
    async fn purchase_without_funds_touches_nothing() {
        let (store, w) = wallet().await;
        let tokens = TokenService::load(store, "tokens").await;
        let input = NewToken { value: 5, token_type: "gold".into(), metadata: Metadata::new() };
        let err = w.purchase_token(&tokens, input).await.unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { balance: 0, requested: 5 });
        assert!(w.transactions().await.is_empty());
        assert_eq!(tokens.count().await, 0);
    }

    #[tokio::test]
    async fn purchase_emits_debit_then_purchase() -> Result<(), anyhow::Error> {
        let (store, w) = wallet().await;
        let tokens = TokenService::load(store, "tokens").await;
        w.add_funds(10, Metadata::new()).await?;
        let (events, listener) = recorder();
        w.subscribe(listener);

        let receipt = w
            .purchase_token(&tokens, NewToken { value: 10, token_type: "gold".into(), metadata: Metadata::new() })
            .await?;
        assert_eq!(receipt.transaction.balance_after, 0);
        let kinds: Vec<String> = events.lock().unwrap().iter().map(|e| e.event_type.clone()).collect();
        assert_eq!(kinds, vec!["funds_deducted", "token_purchased"]);
        Ok(())
    }

    #[test]
    fn replay_clamps_negative_ledger() {
        let rows = vec![Transaction::new(TransactionKind::Debit, 5, 0, Metadata::new())];
        assert_eq!(replay_balance(&rows), 0);
    }
}
