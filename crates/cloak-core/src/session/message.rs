//! Values that leave the manager: ciphertexts, audit events and key shares.

use cloak_crypto::{Hash, KeyId, Nonce, PublicKey};
use serde::{Deserialize, Serialize};

use super::policy::RotationReason;
use crate::ids::GroupId;

/// A message sealed under a group session key.
///
/// Everything except `content` is public metadata; the group id, key id and
/// generation are bound into the AEAD associated data, so altering any of
/// them makes decryption fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    /// Ciphertext with authentication tag
    pub content: Vec<u8>,
    /// Key the message was sealed under
    pub key_id: KeyId,
    /// AEAD nonce, fresh per message
    pub nonce: Nonce,
    /// Generation of the key
    pub generation: u32,
    /// Commitment to the sender identity under this key
    pub sender_commitment: Hash,
    /// Seal time, seconds since the Unix epoch
    pub timestamp: u64,
}

/// Append-only audit record of one rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    /// Group whose key was rotated
    pub group_id: GroupId,
    /// Key that stopped being current
    pub old_key_id: KeyId,
    /// Key that became current
    pub new_key_id: KeyId,
    /// Why the rotation happened
    pub reason: RotationReason,
    /// Generation of the new key
    pub generation: u32,
    /// Rotation time, seconds since the Unix epoch
    pub timestamp: u64,
}

/// A session key wrapped for one peer.
///
/// The wrapping key comes from X25519 agreement between a one-time
/// ephemeral key and the peer's public key, expanded with HKDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShare {
    /// Group the key belongs to
    pub group_id: GroupId,
    /// Identifier of the wrapped key
    pub key_id: KeyId,
    /// Generation of the wrapped key
    pub generation: u32,
    /// Expiry of the wrapped key, seconds since the Unix epoch
    pub expires_at: u64,
    /// Sender's one-time agreement key
    pub ephemeral_public: PublicKey,
    /// AEAD nonce of the wrapped key
    pub nonce: Nonce,
    /// Wrapped key material with authentication tag
    pub ciphertext: Vec<u8>,
}
