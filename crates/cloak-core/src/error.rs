//! Error types for the Cloak privacy core.
//!
//! Strongly-typed errors per layer: membership errors (input validity,
//! randomness), session errors (group state, key lookup, primitive failures)
//! and status-source errors (confirmation polling).
//!
//! Lookup misses that happen during normal operation are modelled as
//! ordinary results where possible (`MembershipLookup::NotAMember`) and as
//! non-fatal errors otherwise (`SessionError::KeyNotFound`).

use cloak_crypto::{CryptoError, KeyId};
use thiserror::Error;

use crate::ids::GroupId;

/// Errors from building trees and generating seeds.
///
/// Input errors are reported before any hashing takes place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// The member set is empty
    #[error("member set is empty")]
    EmptyGroup,

    /// The member set exceeds tree capacity
    #[error("member set has {size} members, capacity is {max}")]
    GroupTooLarge {
        /// Number of members supplied
        size: usize,
        /// Tree capacity
        max: usize,
    },

    /// A member identifier is empty or too long
    #[error("invalid identifier at position {position}: {reason}")]
    InvalidIdentifier {
        /// Position in the member set
        position: usize,
        /// What is wrong with it
        reason: &'static str,
    },

    /// The same identifier appears twice
    #[error("duplicate member at position {position}")]
    DuplicateMember {
        /// Position of the second occurrence
        position: usize,
    },

    /// The OS entropy source failed
    #[error("randomness unavailable: {reason}")]
    Randomness {
        /// Reason reported by the entropy source
        reason: String,
    },
}

impl MembershipError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Input errors are caller mistakes and can be fixed by correcting the
    /// member set; an entropy failure is an environment fault.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Randomness { .. })
    }
}

impl From<getrandom::Error> for MembershipError {
    fn from(err: getrandom::Error) -> Self {
        Self::Randomness { reason: err.to_string() }
    }
}

/// Errors from session key operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation on a group that was never initialized (or was torn down)
    #[error("group {group_id} is not initialized")]
    GroupNotInitialized {
        /// The group that was addressed
        group_id: GroupId,
    },

    /// `initialize_group` called twice without a teardown
    #[error("group {group_id} is already initialized")]
    AlreadyInitialized {
        /// The group that was addressed
        group_id: GroupId,
    },

    /// No current or retained key matches the message
    ///
    /// Usually means the local key-sync state is behind the sender.
    #[error("no key {key_id} for group {group_id}")]
    KeyNotFound {
        /// Group the message claims to belong to
        group_id: GroupId,
        /// Key the message was encrypted under
        key_id: KeyId,
    },

    /// The key was found but authentication failed
    #[error("decryption failed for key {key_id}: {reason}")]
    DecryptionFailed {
        /// Key that was used
        key_id: KeyId,
        /// Reason for decryption failure
        reason: String,
    },

    /// A key share did not unwrap to the key it claims to carry
    #[error("invalid key share: {reason}")]
    InvalidKeyShare {
        /// What did not match
        reason: String,
    },

    /// The retention limit has no room for an imported key
    ///
    /// Raised when the imported key is older than every retained key and
    /// the limit is reached, so keeping it would evict it immediately.
    #[error("retention limit {limit} of group {group_id} cannot hold generation {generation}")]
    RetentionFull {
        /// Group importing the key
        group_id: GroupId,
        /// Generation of the rejected key
        generation: u32,
        /// Configured retention limit
        limit: usize,
    },

    /// Generation counter would overflow
    #[error("generation overflow at {current} for group {group_id}")]
    GenerationOverflow {
        /// Group being rotated
        group_id: GroupId,
        /// Current generation when overflow was detected
        current: u32,
    },

    /// A primitive provider call failed; no state was changed
    #[error("crypto provider error: {0}")]
    Crypto(#[from] CryptoError),
}

impl SessionError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors indicate a programmer error, a broken provider or
    /// tampering. Non-fatal errors may be resolved by syncing key state.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Programmer errors and primitive failures - fatal
            Self::GroupNotInitialized { .. } => true,
            Self::AlreadyInitialized { .. } => true,
            Self::GenerationOverflow { .. } => true,
            Self::Crypto(_) => true,

            // Tampering or corruption of a single message - fatal for it
            Self::DecryptionFailed { .. } => true,
            Self::InvalidKeyShare { .. } => true,

            // Potentially recoverable - need key sync
            Self::KeyNotFound { .. } => false,

            // Policy refusal; nothing was changed
            Self::RetentionFull { .. } => false,
        }
    }
}

/// Errors reported by a [`crate::confirmation::StatusSource`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// The status backend could not be reached
    #[error("status source unavailable: {0}")]
    Unavailable(String),

    /// The backend does not know the reference
    #[error("unknown reference: {0}")]
    UnknownReference(String),
}

impl StatusError {
    /// Returns true if retrying the lookup cannot help.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Unavailable(_) => false,
            Self::UnknownReference(_) => true,
        }
    }
}
