//! Request handlers, one per protocol method.
//!
//! The follower side of every mutation is the session identity, never a
//! caller-supplied field, which is what rules out impersonation.

use crate::protocol::{
    AuthenticateParams, Response, StatsParams, StatusParams, ToggleParams, ToggleResult,
    StatsResult, StatusResult,
};
use crate::SharedStore;
use serde_json::Value;
use tether_core::{FollowError, UserId};
use tracing::{debug, info};

/// Per-connection state: the authenticated caller, if any.
#[derive(Debug, Default)]
pub struct Session {
    identity: Option<UserId>,
}

impl Session {
    pub fn identity(&self) -> Option<&UserId> {
        self.identity.as_ref()
    }

    fn authenticated(&self) -> Result<&UserId, FollowError> {
        self.identity.as_ref().ok_or_else(|| {
            FollowError::Unauthenticated("no identity bound to this connection".into())
        })
    }
}

/// Handles session.authenticate.
///
/// The upstream auth provider is an external collaborator; by the time
/// a request reaches this server the transport has already vouched for
/// it, so the handler only validates and binds the id.
pub async fn handle_authenticate(
    session: &mut Session,
    id: Option<Value>,
    params: AuthenticateParams,
) -> Response {
    let user = match UserId::parse(params.user_id) {
        Ok(u) => u,
        Err(e) => return Response::follow_error(id, &e),
    };
    info!(%user, "session authenticated");
    session.identity = Some(user.clone());
    Response::success(id, serde_json::json!({ "userId": user }))
}

/// Handles follow.toggle.
pub async fn handle_toggle(
    store: SharedStore,
    session: &Session,
    id: Option<Value>,
    params: ToggleParams,
) -> Response {
    let follower = match session.authenticated() {
        Ok(u) => u.clone(),
        Err(e) => return Response::follow_error(id, &e),
    };
    let target = match UserId::parse(params.target_user_id) {
        Ok(u) => u,
        Err(e) => return Response::follow_error(id, &e),
    };

    debug!(%follower, %target, "toggle requested");
    match store.toggle(&follower, &target) {
        Ok(status) => Response::success(id, ToggleResult { status }),
        Err(e) => Response::follow_error(id, &e),
    }
}

/// Handles follow.stats.
///
/// `userId` defaults to the session identity; asking about another user
/// does not require authentication, asking about "me" does.
pub async fn handle_stats(
    store: SharedStore,
    session: &Session,
    id: Option<Value>,
    params: StatsParams,
) -> Response {
    let user = match params.user_id {
        Some(raw) => match UserId::parse(raw) {
            Ok(u) => u,
            Err(e) => return Response::follow_error(id, &e),
        },
        None => match session.identity() {
            Some(u) => u.clone(),
            None => {
                return Response::follow_error(
                    id,
                    &FollowError::InvalidArgument(
                        "userId is required when the session is anonymous".into(),
                    ),
                )
            }
        },
    };

    match store.follow_stats(&user) {
        Ok(stats) => Response::success(
            id,
            StatsResult {
                followers_count: stats.followers_count,
                following_count: stats.following_count,
            },
        ),
        Err(e) => Response::follow_error(id, &e),
    }
}

/// Handles follow.status.
pub async fn handle_status(
    store: SharedStore,
    session: &Session,
    id: Option<Value>,
    params: StatusParams,
) -> Response {
    let follower = match session.authenticated() {
        Ok(u) => u.clone(),
        Err(e) => return Response::follow_error(id, &e),
    };
    let target = match UserId::parse(params.target_user_id) {
        Ok(u) => u,
        Err(e) => return Response::follow_error(id, &e),
    };

    match store.is_following(&follower, &target) {
        Ok(is_following) => Response::success(id, StatusResult { is_following }),
        Err(e) => Response::follow_error(id, &FollowError::from(e)),
    }
}
