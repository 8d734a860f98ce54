//! The user lifecycle hook.
//!
//! Subscribes to the account subsystem's event stream and
//! zero-initializes the counters of freshly created records. The hook
//! is fire-and-forget: a failure here is logged and left to the next
//! event replay or reconciliation pass, never surfaced to a caller.

use crate::SharedStore;
use tether_core::AccountEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Consumes account events until the stream closes.
///
/// Safe against replay and reordering: `ensure_counters` is a no-op on
/// an already-initialized record. A lagged receiver (events dropped
/// under burst) is tolerated for the same reason and only logged.
pub async fn run_lifecycle_hook(
    store: SharedStore,
    mut events: broadcast::Receiver<AccountEvent>,
) {
    loop {
        match events.recv().await {
            Ok(AccountEvent::Created { user_id }) => {
                match store.ensure_counters(&user_id) {
                    Ok(true) => debug!(%user_id, "initialized follow counters"),
                    Ok(false) => debug!(%user_id, "counters already initialized"),
                    Err(e) => warn!(%user_id, "lifecycle hook failed, reconciliation will repair: {e}"),
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("lifecycle hook lagged, {n} account events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use tether_core::{UserId, UserRecord};
    use tether_graph::FollowStore;

    #[tokio::test]
    async fn test_hook_initializes_new_records_once() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FollowStore::open(dir.path()).unwrap());
        let u = UserId::parse("u1").unwrap();
        store.put_user(&u, &UserRecord::new(0)).unwrap();

        let (tx, rx) = broadcast::channel(16);
        let hook = tokio::spawn(run_lifecycle_hook(Arc::clone(&store), rx));

        // Delivered twice: the second must be a no-op.
        tx.send(AccountEvent::Created { user_id: u.clone() }).unwrap();
        tx.send(AccountEvent::Created { user_id: u.clone() }).unwrap();
        // Unknown user: logged, not fatal to the hook.
        tx.send(AccountEvent::Created {
            user_id: UserId::parse("ghost").unwrap(),
        })
        .unwrap();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), hook)
            .await
            .unwrap()
            .unwrap();

        let rec = store.get_user(&u).unwrap().unwrap();
        assert_eq!(rec.followers_count, Some(0));
        assert_eq!(rec.following_count, Some(0));
    }
}
