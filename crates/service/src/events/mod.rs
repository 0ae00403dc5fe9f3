//! Integration listener: fans service events out to pattern subscribers.
//!
//! ```text
//!   auth ──┐                       ┌─► "wallet:funds_added" callbacks
//! tokens ──┼─► emit() ─► queue ─► ─┼─► "wallet:*" callbacks
//! wallet ──┘   (FIFO)    drain     └─► "*" callbacks
//! ```
//!
//! Events emitted while a drain is in progress (including from inside a
//! callback) are appended to the queue and handled by the drain already
//! running, after the current event.

pub mod listener;

pub use listener::{EventCallback, IntegrationListener, ListenerId};

/// Pattern matching every event.
pub const WILDCARD: &str = "*";
