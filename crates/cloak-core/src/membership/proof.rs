//! Membership proofs and their standalone verification.

use cloak_crypto::{Hash, MerkleHasher};
use serde::{Deserialize, Serialize};

use super::{MAX_MEMBERS, TREE_DEPTH};

/// Proof that a leaf is part of a tree with a given root.
///
/// `path[i]` is the sibling at level `i`; whether it sits to the left or the
/// right is decided by the parity of `index >> i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    /// Leaf hash of the proving member
    pub leaf: Hash,
    /// Sibling hashes from the leaf level upward
    pub path: [Hash; TREE_DEPTH],
    /// Leaf position in the padded tree
    pub index: u32,
    /// Root the proof claims membership in
    pub root: Hash,
}

impl MembershipProof {
    /// Verify this proof with `hasher`. See [`verify_membership`].
    pub fn verify<H: MerkleHasher>(&self, hasher: &H) -> bool {
        verify_membership(hasher, self)
    }
}

/// Outcome of a membership query.
///
/// A non-member is an expected answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipLookup {
    /// The identifier is in the tree
    Member(MembershipProof),
    /// The identifier is not in the tree
    NotAMember,
}

impl MembershipLookup {
    /// Whether the identifier was found.
    pub fn is_member(&self) -> bool {
        matches!(self, Self::Member(_))
    }

    /// The proof, if the identifier was found.
    pub fn into_proof(self) -> Option<MembershipProof> {
        match self {
            Self::Member(proof) => Some(proof),
            Self::NotAMember => None,
        }
    }
}

/// Recompute the root from `proof.leaf` and `proof.path` and compare it with
/// `proof.root`.
///
/// Needs no tree: this is exactly what an external verifier runs. The
/// combination order at each level mirrors
/// [`super::MerkleTree::prove_membership`]: an odd index means the running
/// hash is the right child.
pub fn verify_membership<H: MerkleHasher>(hasher: &H, proof: &MembershipProof) -> bool {
    let mut index = proof.index as usize;
    if index >= MAX_MEMBERS {
        return false;
    }

    let mut current = proof.leaf;
    for sibling in &proof.path {
        current = if index % 2 == 1 {
            hasher.hash_pair(sibling, &current)
        } else {
            hasher.hash_pair(&current, sibling)
        };
        index /= 2;
    }

    current == proof.root
}
