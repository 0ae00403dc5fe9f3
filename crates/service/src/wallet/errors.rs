use thiserror::Error;

use crate::tokens::errors::TokenError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Invalid amount")]
    InvalidAmount,
    #[error("Insufficient funds")]
    InsufficientFunds { balance: u64, requested: u64 },
    #[error("Balance overflow")]
    Overflow,
    /// Token creation failed after the debit; the amount has been re-credited.
    #[error("{0}")]
    Purchase(#[from] TokenError),
}
