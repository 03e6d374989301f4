//! Fuzz target for membership proofs
//!
//! Builds trees from arbitrary member sets and attacks the proofs they
//! produce.
//!
//! # Strategy
//!
//! - Arbitrary member sets (empty, duplicated, oversized identifiers)
//! - Both padding strategies
//! - Single-field mutations of honest proofs (leaf, sibling, index, root)
//!
//! # Invariants
//!
//! - Building never panics; invalid sets are rejected with an error
//! - Every member of a valid set gets a verifying proof
//! - Mutating the leaf, a sibling or the root fails verification
//! - An out-of-range index fails verification

#![no_main]

use arbitrary::Arbitrary;
use cloak_core::{MAX_MEMBERS, MerkleTree, Padding, verify_membership};
use cloak_crypto::{Hash, Sha256Hasher};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct ProofScenario {
    members: Vec<Vec<u8>>,
    zero_padding: bool,
    /// Which member to prove (modulo set size)
    target: u8,
    mutation: Mutation,
}

#[derive(Debug, Clone, Arbitrary)]
enum Mutation {
    None,
    Leaf([u8; 32]),
    Sibling { level: u8, value: [u8; 32] },
    Index(u32),
    Root([u8; 32]),
}

fuzz_target!(|scenario: ProofScenario| {
    let padding = if scenario.zero_padding { Padding::ZeroLeaf } else { Padding::RepeatLastLeaf };

    // INVARIANT 1: Build never panics
    let Ok(tree) = MerkleTree::build_with(Sha256Hasher, padding, &scenario.members) else {
        return;
    };
    assert!(tree.member_count() <= MAX_MEMBERS);

    // INVARIANT 2: Members always get verifying proofs
    let target = &scenario.members[scenario.target as usize % scenario.members.len()];
    let honest = tree
        .prove_membership(target)
        .into_proof()
        .expect("every member of a built tree has a proof");
    assert!(verify_membership(&Sha256Hasher, &honest), "honest proof must verify");

    // INVARIANT 3: Mutations are detected
    let mut proof = honest.clone();
    let index_only = matches!(scenario.mutation, Mutation::Index(_));
    match scenario.mutation {
        Mutation::None => return,
        Mutation::Leaf(value) => proof.leaf = Hash::new(value),
        Mutation::Sibling { level, value } => {
            let level = level as usize % proof.path.len();
            proof.path[level] = Hash::new(value);
        },
        Mutation::Index(index) => proof.index = index,
        Mutation::Root(value) => proof.root = Hash::new(value),
    }

    if proof == honest {
        return;
    }

    if index_only {
        // Repeated padding makes sibling subtrees equal, so some in-range
        // indices are interchangeable; out-of-range ones never verify
        if proof.index as usize >= MAX_MEMBERS {
            assert!(!verify_membership(&Sha256Hasher, &proof), "out-of-range index must fail");
        }
    } else {
        assert!(!verify_membership(&Sha256Hasher, &proof), "mutated proof must not verify");
    }
});
