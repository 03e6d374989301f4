//! Identifiers shared by the membership and session layers.

use std::fmt;

use cloak_crypto::Hash;
use serde::{Deserialize, Serialize};

/// 32-byte group identifier.
///
/// Scopes session keys and nullifiers. Assigned by the membership registry;
/// the core never generates one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId([u8; 32]);

impl GroupId {
    /// Wrap raw identifier bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the identifier.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The identifier as a hash-width value for hash combining.
    pub fn as_hash(&self) -> Hash {
        Hash::new(self.0)
    }
}

impl From<[u8; 32]> for GroupId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({self})")
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight bytes are plenty to tell groups apart in logs
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// 32-byte identifier of a one-time action (a vote, a post, a claim).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ActionId([u8; 32]);

impl ActionId {
    /// Wrap raw identifier bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The identifier as a hash-width value for hash combining.
    pub fn as_hash(&self) -> Hash {
        Hash::new(self.0)
    }
}

impl From<[u8; 32]> for ActionId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_id_display_is_short_hex() {
        let group = GroupId::new([0xAB; 32]);
        assert_eq!(group.to_string(), "abababababababab");
    }

    #[test]
    fn group_id_hash_view_preserves_bytes() {
        let group = GroupId::new([7; 32]);
        assert_eq!(group.as_hash().as_bytes(), group.as_bytes());
    }
}
