//! Fixed-depth Merkle tree over a member set.

use std::collections::HashSet;

use cloak_crypto::{Hash, MerkleHasher, Sha256Hasher};
use serde::{Deserialize, Serialize};

use super::{
    MAX_IDENTIFIER_LEN, MAX_MEMBERS, TREE_DEPTH,
    proof::{MembershipLookup, MembershipProof},
};
use crate::error::MembershipError;

/// How unused leaf slots are filled.
///
/// Verifiers must use the same strategy, since it changes the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Padding {
    /// Repeat the last real leaf into every unused slot
    #[default]
    RepeatLastLeaf,
    /// Fill unused slots with the all-zero hash
    ZeroLeaf,
}

/// A Merkle tree built from an ordered member set.
///
/// The tree always has `MAX_MEMBERS` leaf slots and `TREE_DEPTH + 1` levels,
/// regardless of how many members it was built from.
///
/// # Invariants
///
/// - `levels[0].len() == MAX_MEMBERS`
/// - `levels[TREE_DEPTH].len() == 1` and that node is `root`
/// - `levels[l][i] == hash_pair(levels[l - 1][2i], levels[l - 1][2i + 1])`
/// - `leaves` holds only real members, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree<H = Sha256Hasher> {
    hasher: H,
    /// Leaf hashes of the real members.
    leaves: Vec<Hash>,
    /// Node hashes per level, from padded leaves (level 0) to root.
    levels: Vec<Vec<Hash>>,
    root: Hash,
}

impl MerkleTree<Sha256Hasher> {
    /// Build a tree with the default hasher and padding.
    ///
    /// # Errors
    ///
    /// - `EmptyGroup` if `members` is empty
    /// - `GroupTooLarge` if there are more than `MAX_MEMBERS` members
    /// - `InvalidIdentifier` / `DuplicateMember` for malformed input
    pub fn build<I: AsRef<[u8]>>(members: &[I]) -> Result<Self, MembershipError> {
        Self::build_with(Sha256Hasher, Padding::default(), members)
    }
}

impl<H: MerkleHasher> MerkleTree<H> {
    /// Build a tree with an explicit hasher and padding strategy.
    ///
    /// The whole member set is validated before anything is hashed.
    /// Identical ordered input always produces an identical tree.
    pub fn build_with<I: AsRef<[u8]>>(
        hasher: H,
        padding: Padding,
        members: &[I],
    ) -> Result<Self, MembershipError> {
        validate_members(members)?;

        let leaves: Vec<Hash> =
            members.iter().map(|member| hasher.hash_leaf(member.as_ref())).collect();

        let pad = match padding {
            Padding::RepeatLastLeaf => *leaves.last().ok_or(MembershipError::EmptyGroup)?,
            Padding::ZeroLeaf => Hash::ZERO,
        };

        let mut current = Vec::with_capacity(MAX_MEMBERS);
        current.extend_from_slice(&leaves);
        current.resize(MAX_MEMBERS, pad);

        let mut levels = Vec::with_capacity(TREE_DEPTH + 1);
        for _ in 0..TREE_DEPTH {
            let next: Vec<Hash> =
                current.chunks_exact(2).map(|pair| hasher.hash_pair(&pair[0], &pair[1])).collect();
            levels.push(current);
            current = next;
        }

        debug_assert_eq!(current.len(), 1, "fold must end in a single root");
        let root = current[0];
        levels.push(current);

        tracing::debug!(members = leaves.len(), ?padding, %root, "Built membership tree");

        Ok(Self { hasher, leaves, levels, root })
    }

    /// Root hash of the tree.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Leaf hashes of the real members, in input order.
    pub fn leaves(&self) -> &[Hash] {
        &self.leaves
    }

    /// All levels, from padded leaves (index 0) to the root.
    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }

    /// Number of real members.
    pub fn member_count(&self) -> usize {
        self.leaves.len()
    }

    /// Hasher the tree was built with.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Produce a membership proof for `identifier`.
    ///
    /// Returns [`MembershipLookup::NotAMember`] when the identifier is not in
    /// the member set. Only real leaves are searched; padding never matches
    /// on its own.
    pub fn prove_membership(&self, identifier: &[u8]) -> MembershipLookup {
        let leaf = self.hasher.hash_leaf(identifier);
        let Some(index) = self.leaves.iter().position(|candidate| *candidate == leaf) else {
            return MembershipLookup::NotAMember;
        };

        let mut path = [Hash::ZERO; TREE_DEPTH];
        let mut current = index;
        for (level, sibling) in path.iter_mut().enumerate() {
            // Odd index: we are the right child, sibling is on the left
            let sibling_index = if current % 2 == 1 { current - 1 } else { current + 1 };
            *sibling = self.levels[level][sibling_index];
            current /= 2;
        }

        MembershipLookup::Member(MembershipProof {
            leaf,
            path,
            index: index as u32,
            root: self.root,
        })
    }
}

/// Reject empty, oversized, malformed or duplicated input.
fn validate_members<I: AsRef<[u8]>>(members: &[I]) -> Result<(), MembershipError> {
    if members.is_empty() {
        return Err(MembershipError::EmptyGroup);
    }

    if members.len() > MAX_MEMBERS {
        return Err(MembershipError::GroupTooLarge { size: members.len(), max: MAX_MEMBERS });
    }

    let mut seen = HashSet::with_capacity(members.len());
    for (position, member) in members.iter().enumerate() {
        let identifier = member.as_ref();

        if identifier.is_empty() {
            return Err(MembershipError::InvalidIdentifier {
                position,
                reason: "identifier is empty",
            });
        }

        if identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(MembershipError::InvalidIdentifier {
                position,
                reason: "identifier exceeds 256 bytes",
            });
        }

        if !seen.insert(identifier) {
            return Err(MembershipError::DuplicateMember { position });
        }
    }

    Ok(())
}
