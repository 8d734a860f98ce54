//! Fault injection helpers for tests.
//!
//! Only compiled for this crate's own tests or when the `testkit`
//! feature is enabled by a dependent crate's dev-dependencies.

use crate::keys::user_key;
use crate::store::{FollowStore, StoreError};
use tether_core::UserId;

/// Overwrites a user record with bytes that do not decode.
///
/// Lets tests exercise the per-user failure paths that a real
/// deployment only hits after on-disk corruption.
pub fn corrupt_user_record(store: &FollowStore, user: &UserId) -> Result<(), StoreError> {
    store.users.insert(user_key(user), &[0xff, 0xff, 0xff][..])?;
    store.db.flush()?;
    Ok(())
}
