//! Domain records shared by the service layer.
//!
//! Every record serializes to the JSON shape kept under its storage key.
//! Open-ended fields (`credentials`, `metadata`) are flattened into the record.

pub mod errors;
pub mod session;
pub mod token;
pub mod transaction;
pub mod event;
pub mod history;

pub use errors::ModelError;
pub use event::{IntegrationEvent, ServiceEvent};
pub use history::HistoryEntry;
pub use session::Session;
pub use token::{NewToken, Token, TokenPatch};
pub use transaction::{Transaction, TransactionKind};

/// Free-form JSON object carried by records.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
