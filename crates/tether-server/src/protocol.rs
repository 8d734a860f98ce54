//! JSON-RPC 2.0 message types and the error-code mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_core::FollowError;

/// Error codes carried on the wire.
///
/// The JSON-RPC reserved codes are used where they fit; the follow
/// taxonomy gets codes in the implementation-defined range.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL: i64 = -32603;
    pub const UNAUTHENTICATED: i64 = -32001;
    pub const NOT_FOUND: i64 = -32004;
}

/// An incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A wire error.
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// An outgoing response.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Option<Value>, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self {
                jsonrpc: "2.0",
                id,
                result: Some(value),
                error: None,
            },
            Err(e) => Self::error(id, codes::INTERNAL, format!("result encoding failed: {e}")),
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn parse_error() -> Self {
        Self::error(None, codes::PARSE_ERROR, "could not parse request")
    }

    pub fn invalid_params(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::error(id, codes::INVALID_PARAMS, message)
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(
            id,
            codes::METHOD_NOT_FOUND,
            format!("unknown method: {method}"),
        )
    }

    /// Maps the follow taxonomy onto wire codes, keeping the specific
    /// human-readable message intact.
    pub fn follow_error(id: Option<Value>, err: &FollowError) -> Self {
        let code = match err {
            FollowError::Unauthenticated(_) => codes::UNAUTHENTICATED,
            FollowError::InvalidArgument(_) => codes::INVALID_PARAMS,
            FollowError::NotFound(_) => codes::NOT_FOUND,
            FollowError::Internal(_) => codes::INTERNAL,
        };
        Self::error(id, code, err.to_string())
    }
}

// ── Method parameter and result shapes ──────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateParams {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleParams {
    pub target_user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusParams {
    pub target_user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub status: tether_core::ToggleStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResult {
    pub followers_count: u64,
    pub following_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub is_following: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parses_without_id() {
        let req: Request =
            serde_json::from_str(r#"{"method":"follow.toggle","params":{"targetUserId":"u2"}}"#)
                .unwrap();
        assert!(req.id.is_none());
        assert_eq!(req.method, "follow.toggle");
    }

    #[test]
    fn test_success_wire_shape() {
        let resp = Response::success(
            Some(1.into()),
            StatsResult {
                followers_count: 1,
                following_count: 0,
            },
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["result"]["followersCount"], 1);
        assert_eq!(json["result"]["followingCount"], 0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_follow_error_codes() {
        use tether_core::FollowError;

        let resp = Response::follow_error(
            None,
            &FollowError::InvalidArgument("cannot follow yourself".into()),
        );
        let err = resp.error.unwrap();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert!(err.message.contains("cannot follow yourself"));

        let resp = Response::follow_error(None, &FollowError::NotFound("u9".into()));
        assert_eq!(resp.error.unwrap().code, codes::NOT_FOUND);
    }
}
