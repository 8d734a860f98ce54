//! Key encoding for the three trees.
//!
//! User keys and edge-key components are length-prefixed (u32 BE) so
//! that composite keys cannot collide: ("ab", "c") and ("a", "bc")
//! encode differently, and a prefix scan on one encoded id matches
//! exactly that id's edges.

use crate::store::StoreError;
use tether_core::UserId;

/// Encodes one id as a length-prefixed component.
///
/// Also the full key of a user record, and the scan prefix for that
/// user's adjacency set.
pub(crate) fn user_key(id: &UserId) -> Vec<u8> {
    let bytes = id.as_bytes();
    let mut key = Vec::with_capacity(4 + bytes.len());
    key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(bytes);
    key
}

/// Encodes an edge key: first component, then second.
///
/// In the `following` tree the first component is the follower; in the
/// `followers` tree it is the followed user. The mirror entry of an
/// edge is the same pair with the components swapped.
pub(crate) fn edge_key(first: &UserId, second: &UserId) -> Vec<u8> {
    let mut key = user_key(first);
    key.extend_from_slice(&user_key(second));
    key
}

/// Decodes a user key back to its id.
pub(crate) fn decode_user_key(key: &[u8]) -> Result<UserId, StoreError> {
    let (id, rest) = split_component(key)?;
    if !rest.is_empty() {
        return Err(StoreError::Corrupt(format!(
            "user key has {} trailing bytes",
            rest.len()
        )));
    }
    Ok(id)
}

/// Decodes the second component of an edge key, given the scan prefix
/// used to find it.
pub(crate) fn decode_edge_suffix(key: &[u8], prefix_len: usize) -> Result<UserId, StoreError> {
    let suffix = key.get(prefix_len..).ok_or_else(|| {
        StoreError::Corrupt(format!("edge key shorter than its {prefix_len} byte prefix"))
    })?;
    let (id, rest) = split_component(suffix)?;
    if !rest.is_empty() {
        return Err(StoreError::Corrupt(format!(
            "edge key has {} trailing bytes",
            rest.len()
        )));
    }
    Ok(id)
}

fn split_component(bytes: &[u8]) -> Result<(UserId, &[u8]), StoreError> {
    let len_bytes: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| StoreError::Corrupt("key component missing length prefix".into()))?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    let raw = bytes
        .get(4..4 + len)
        .ok_or_else(|| StoreError::Corrupt("key component truncated".into()))?;
    let text = std::str::from_utf8(raw)
        .map_err(|_| StoreError::Corrupt("key component is not UTF-8".into()))?;
    let id = UserId::parse(text)
        .map_err(|e| StoreError::Corrupt(format!("key component is not a valid id: {e}")))?;
    Ok((id, &bytes[4 + len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[test]
    fn test_user_key_roundtrip() {
        let u = id("auth0|5f1a");
        assert_eq!(decode_user_key(&user_key(&u)).unwrap(), u);
    }

    #[test]
    fn test_composite_keys_cannot_collide() {
        assert_ne!(edge_key(&id("ab"), &id("c")), edge_key(&id("a"), &id("bc")));
    }

    #[test]
    fn test_prefix_scan_is_exact() {
        // "u1" must not be a byte prefix of "u10"'s edges.
        let short = edge_key(&id("u1"), &id("x"));
        let long = edge_key(&id("u10"), &id("x"));
        assert!(!long.starts_with(&user_key(&id("u1"))));
        assert!(short.starts_with(&user_key(&id("u1"))));
    }

    #[test]
    fn test_edge_suffix_decode() {
        let prefix = user_key(&id("u1"));
        let key = edge_key(&id("u1"), &id("u2"));
        assert_eq!(decode_edge_suffix(&key, prefix.len()).unwrap(), id("u2"));
    }

    #[test]
    fn test_truncated_key_is_corrupt() {
        assert!(matches!(
            decode_user_key(&[0, 0, 0, 9, b'x']),
            Err(StoreError::Corrupt(_))
        ));
    }
}
