//! Auth module: domain inputs, errors, and the session service.
//!
//! The user is identified by a self-chosen handle only; there is no password
//! or token verification.

pub mod domain;
pub mod errors;
pub mod service;

pub use service::{AuthPolicy, AuthService};
