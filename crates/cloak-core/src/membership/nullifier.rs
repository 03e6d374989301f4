//! Per-action nullifiers.
//!
//! A nullifier is `H(H(seed, group_id), action_id)`. It depends on a secret
//! seed held by the member and on the action context, never on the member's
//! position in the tree. The same member acting twice on the same action
//! produces the same nullifier, which is how repeats are detected without
//! learning who repeated.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use cloak_crypto::{Hash, MerkleHasher};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    error::MembershipError,
    ids::{ActionId, GroupId},
};

/// Secret 256-bit nullifier seed held by a member.
///
/// Wiped on drop. Never logged and never part of a proof.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 32]);

impl Seed {
    /// Wrap raw seed bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Raw seed bytes.
    pub fn expose_secret(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex encoding of the seed, for handing it to its owner.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// One-time tag for an action.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Nullifier(Hash);

impl Nullifier {
    /// The nullifier as a hash value.
    pub fn as_hash(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Derive the nullifier for `(seed, group_id, action_id)`.
///
/// Two sequential pair hashes: `H(H(seed, group_id), action_id)`.
/// Deterministic in all three inputs and independent of the member index.
pub fn derive_nullifier<H: MerkleHasher>(
    hasher: &H,
    seed: &Seed,
    group_id: &GroupId,
    action_id: &ActionId,
) -> Nullifier {
    let seed_hash = Hash::new(*seed.expose_secret());
    let scoped = hasher.hash_pair(&seed_hash, &group_id.as_hash());
    Nullifier(hasher.hash_pair(&scoped, &action_id.as_hash()))
}

/// Generate a fresh seed from the OS CSPRNG.
///
/// The only operation of the accumulator that needs true randomness.
pub fn generate_seed() -> Result<Seed, MembershipError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)?;
    Ok(Seed::new(bytes))
}

/// Result of recording a nullifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullifierStatus {
    /// First time this nullifier was seen for the action
    Fresh,
    /// The nullifier was already recorded for the action
    Duplicate,
}

/// Host-side record of nullifiers seen per action.
///
/// Mirrors the duplicate check an external verifier performs, so a client
/// can refuse to submit (or flag) a repeated action locally.
#[derive(Debug, Clone, Default)]
pub struct NullifierSet {
    by_action: HashMap<ActionId, HashSet<Nullifier>>,
}

impl NullifierSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `nullifier` for `action_id`.
    pub fn record(&mut self, action_id: ActionId, nullifier: Nullifier) -> NullifierStatus {
        if self.by_action.entry(action_id).or_default().insert(nullifier) {
            NullifierStatus::Fresh
        } else {
            tracing::debug!(%nullifier, "Duplicate nullifier for action");
            NullifierStatus::Duplicate
        }
    }

    /// Whether `nullifier` was already recorded for `action_id`.
    pub fn contains(&self, action_id: &ActionId, nullifier: &Nullifier) -> bool {
        self.by_action.get(action_id).is_some_and(|seen| seen.contains(nullifier))
    }

    /// Number of nullifiers recorded for `action_id`.
    pub fn count(&self, action_id: &ActionId) -> usize {
        self.by_action.get(action_id).map_or(0, HashSet::len)
    }
}
