use crate::error::FollowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identifier.
///
/// Identities are minted by the account subsystem; Tether only requires
/// that they are non-empty and NUL-free (keys are length-prefixed in the
/// store, so NUL is not load bearing, but it is rejected anyway as
/// hygiene for external surfaces).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validates and wraps a raw id.
    pub fn parse(raw: impl Into<String>) -> Result<Self, FollowError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(FollowError::InvalidArgument(
                "user id must not be empty".into(),
            ));
        }
        if raw.contains('\0') {
            return Err(FollowError::InvalidArgument(
                "user id must not contain NUL".into(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
