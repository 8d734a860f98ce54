//! Tether Core - Shared domain types for the follow graph
//!
//! This crate defines the vocabulary every other Tether crate speaks:
//! user identifiers, the user record with its denormalized counters,
//! the follow edge, the caller-facing error taxonomy, and the account
//! events that drive the user lifecycle hook.

mod error;
mod event;
mod id;
mod model;

pub use error::FollowError;
pub use event::AccountEvent;
pub use id::UserId;
pub use model::{FollowEdge, FollowStats, ToggleStatus, UserRecord};
