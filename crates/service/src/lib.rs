//! Service layer: session, token and wallet services plus the plumbing that
//! ties them together.
//! - Services own their in-memory state and write it through a `KeyValueStore`.
//! - Each service raises its own events; the integration listener fans them out.
//! - The state machine gates which actions are allowed and records history.

pub mod errors;
pub mod storage;
pub mod subscribers;
pub mod auth;
pub mod tokens;
pub mod wallet;
pub mod events;
pub mod state;
pub mod coordinator;
#[cfg(test)]
pub mod test_support;

pub use coordinator::{Coordinator, Snapshot};
