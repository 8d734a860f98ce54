//! Tether Server - WebSocket front door for the follow graph
//!
//! This crate exposes the three caller-invokable operations over
//! JSON-RPC 2.0 on a WebSocket, one connection per caller:
//! - `session.authenticate` binds a caller identity to the connection
//! - `follow.toggle` flips the follow state toward a target user
//! - `follow.stats` reads the denormalized counters
//! - `follow.status` probes pairwise follow state
//!
//! It also hosts the user lifecycle hook: a task subscribed to the
//! account subsystem's event stream that zero-initializes counters on
//! freshly created records.

use std::sync::Arc;
use tether_graph::FollowStore;

/// Store handle shared across connections and background tasks.
pub type SharedStore = Arc<FollowStore>;

mod handlers;
mod lifecycle;
mod protocol;
mod server;

pub use lifecycle::run_lifecycle_hook;
pub use protocol::{Request, Response, RpcError};
pub use server::{FollowServer, ServerConfig};
