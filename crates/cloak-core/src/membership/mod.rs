//! Membership accumulator: anonymous proofs of group membership
//!
//! A fixed-depth binary Merkle tree over the member set. A member proves it
//! belongs to the group by presenting its leaf and the sibling path to the
//! root; the verifier learns the root, not which leaf.
//!
//! # Architecture
//!
//! ```text
//! MemberSet ["m0", "m1", ..]
//!        │
//!        ▼ hash_leaf
//! Leaves (padded to MAX_MEMBERS)
//!        │
//!        ▼ hash_pair, TREE_DEPTH times
//! Root
//!        │
//!        ▼ prove_membership
//! MembershipProof { leaf, path, index, root } ──▶ external verifier
//! ```
//!
//! Nullifiers are derived separately from a member-held seed and the action
//! context, so they never depend on the leaf index.
//!
//! Everything here is a pure function over immutable values; trees can be
//! built and queried concurrently without coordination.

mod nullifier;
mod proof;
mod tree;

pub use nullifier::{
    Nullifier, NullifierSet, NullifierStatus, Seed, derive_nullifier, generate_seed,
};
pub use proof::{MembershipLookup, MembershipProof, verify_membership};
pub use tree::{MerkleTree, Padding};

pub use crate::error::MembershipError;

/// Number of levels between the leaves and the root.
pub const TREE_DEPTH: usize = 8;

/// Tree capacity (`2^TREE_DEPTH`).
pub const MAX_MEMBERS: usize = 1 << TREE_DEPTH;

/// Longest accepted member identifier, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 256;
