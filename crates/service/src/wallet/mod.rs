pub mod errors;
pub mod service;

pub use service::{PurchaseReceipt, WalletService};
