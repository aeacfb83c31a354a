//! Authorization, sessions and dispatch for remote host control.
//!
//! Provides:
//! - `AuthorizationGate` - Allow-list check in front of every dispatch
//! - `SessionRegistry` - Lazily created per-caller session handles
//! - `Dispatcher` - Ordered plan execution that never lets a failure escape

pub mod auth;
pub mod dispatcher;
pub mod registry;

pub use auth::{Access, AuthorizationGate, REJECTION_TEXT};
pub use dispatcher::{DispatchError, Dispatcher};
pub use registry::SessionRegistry;
