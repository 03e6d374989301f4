//! Hash functions for the membership tree.
//!
//! The tree needs exactly two functions: one that turns a member identifier
//! into a leaf and one that combines two nodes into their parent. Both are
//! synchronous; hashing a few hundred nodes is bounded CPU work.

use sha2::{Digest, Sha256};

use crate::types::Hash;

/// Prefix for leaf hashing
const LEAF_PREFIX: u8 = 0x00;

/// Prefix for internal node hashing
const NODE_PREFIX: u8 = 0x01;

/// Leaf and pair hash used by the membership tree.
///
/// External verifiers must run the same implementation, so changing it
/// changes every root.
pub trait MerkleHasher {
    /// Hash a raw member identifier into a leaf.
    fn hash_leaf(&self, data: &[u8]) -> Hash;

    /// Combine two nodes, order-sensitive.
    fn hash_pair(&self, left: &Hash, right: &Hash) -> Hash;
}

/// SHA-256 with one-byte domain prefixes for leaves and internal nodes.
///
/// The prefixes keep a leaf from ever being interpreted as an internal node
/// (second-preimage protection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sha256Hasher;

impl MerkleHasher for Sha256Hasher {
    fn hash_leaf(&self, data: &[u8]) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update([LEAF_PREFIX]);
        hasher.update(data);
        Hash::new(hasher.finalize().into())
    }

    fn hash_pair(&self, left: &Hash, right: &Hash) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update([NODE_PREFIX]);
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        Hash::new(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_hash_is_deterministic() {
        let hasher = Sha256Hasher;
        assert_eq!(hasher.hash_leaf(b"m0"), hasher.hash_leaf(b"m0"));
    }

    #[test]
    fn leaf_and_node_hashes_are_domain_separated() {
        let hasher = Sha256Hasher;
        let left = hasher.hash_leaf(b"a");
        let right = hasher.hash_leaf(b"b");

        let mut concatenated = Vec::with_capacity(64);
        concatenated.extend_from_slice(left.as_bytes());
        concatenated.extend_from_slice(right.as_bytes());

        assert_ne!(hasher.hash_pair(&left, &right), hasher.hash_leaf(&concatenated));
    }

    #[test]
    fn pair_hash_is_order_sensitive() {
        let hasher = Sha256Hasher;
        let a = hasher.hash_leaf(b"a");
        let b = hasher.hash_leaf(b"b");

        assert_ne!(hasher.hash_pair(&a, &b), hasher.hash_pair(&b, &a));
    }
}
