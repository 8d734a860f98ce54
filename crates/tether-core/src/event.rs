use crate::id::UserId;
use serde::{Deserialize, Serialize};

/// Events published by the account subsystem.
///
/// The lifecycle hook subscribes to this stream. No ordering relative to
/// other events is required: the hook is idempotent, so replays and
/// reordering are harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountEvent {
    /// A user record was created.
    Created { user_id: UserId },
}
