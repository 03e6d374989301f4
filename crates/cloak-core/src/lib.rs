//! Cloak Core
//!
//! Privacy core for anonymous group participation: prove membership in a
//! group without revealing which member you are, detect repeated actions
//! with nullifiers, and encrypt group traffic under rotating session keys.
//!
//! # Architecture
//!
//! The core performs no I/O of its own. Primitives come from an injected
//! [`cloak_crypto::CryptoProvider`] and [`cloak_crypto::MerkleHasher`]; time
//! comes from an injected [`env::Environment`]. The same code runs under a
//! deterministic provider and a virtual clock in tests and under the system
//! implementations in production.
//!
//! # Components
//!
//! - [`membership`]: Merkle membership accumulator, proofs and nullifiers
//! - [`session`]: [`SessionKeyManager`] with policy-driven rotation
//! - [`confirmation`]: Advisory polling of external transaction status
//! - [`env`]: Time abstraction

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod confirmation;
pub mod env;
pub mod error;
mod ids;
pub mod membership;
pub mod session;

pub use confirmation::{
    ConfirmationConfig, ConfirmationOutcome, ConfirmationTracker, ConfirmationUpdate,
    StatusSource, TransactionStatus, TxReference,
};
pub use error::{MembershipError, SessionError, StatusError};
pub use ids::{ActionId, GroupId};
pub use membership::{
    MAX_IDENTIFIER_LEN, MAX_MEMBERS, MembershipLookup, MembershipProof, MerkleTree, Nullifier,
    NullifierSet, NullifierStatus, Padding, Seed, TREE_DEPTH, derive_nullifier, generate_seed,
    verify_membership,
};
pub use session::{
    EncryptedMessage, KeyShare, RotationEvent, RotationPolicy, RotationReason, SessionKeyManager,
    SessionKeyMetadata, SharedSessionKeyManager,
};
