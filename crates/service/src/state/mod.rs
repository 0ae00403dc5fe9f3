//! Named actions mapped onto state transitions.
//!
//! The table is keyed by `"state:action"`. Anything not in the table is
//! refused; there is no fallback handler.

pub mod errors;
pub mod machine;

pub use machine::{ActionContext, StateMachine, Transition, TransitionOutcome};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

pub fn transition_key(state: &str, action: &str) -> String {
    format!("{state}:{action}")
}
