//! Session keys and their persistable metadata.

use cloak_crypto::{KeyId, KeyMaterial};
use serde::{Deserialize, Serialize};

use crate::ids::GroupId;

/// Where a session key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOrigin {
    /// Generated by this manager through initialization or rotation
    Local,
    /// Received from a peer through a key share; decrypt-only
    Imported,
}

/// Creation time, expiry and message budget of a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyLifetime {
    pub(crate) created_at: u64,
    pub(crate) expires_at: u64,
    pub(crate) max_messages: u64,
}

/// A symmetric key for one group and one generation.
///
/// Owns its key material, which is zeroized when the key is dropped
/// (teardown, pruning). Exactly one key per group is current; the rest are
/// retained only for decryption.
#[derive(Debug)]
pub struct SessionKey {
    group_id: GroupId,
    key_id: KeyId,
    material: KeyMaterial,
    generation: u32,
    message_count: u64,
    created_at: u64,
    expires_at: u64,
    /// Message budget snapshotted from the policy at creation.
    max_messages: u64,
    origin: KeyOrigin,
}

impl SessionKey {
    pub(crate) fn new(
        group_id: GroupId,
        key_id: KeyId,
        material: KeyMaterial,
        generation: u32,
        lifetime: KeyLifetime,
        origin: KeyOrigin,
    ) -> Self {
        Self {
            group_id,
            key_id,
            material,
            generation,
            message_count: 0,
            created_at: lifetime.created_at,
            expires_at: lifetime.expires_at,
            max_messages: lifetime.max_messages,
            origin,
        }
    }

    /// Group the key belongs to.
    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// Identifier of the key.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Rotation generation this key belongs to.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Messages sealed under this key so far.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Creation time, seconds since the Unix epoch.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Expiry time, seconds since the Unix epoch.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Message budget of this key.
    pub fn max_messages(&self) -> u64 {
        self.max_messages
    }

    /// Where the key came from.
    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    pub(crate) fn material(&self) -> &KeyMaterial {
        &self.material
    }

    pub(crate) fn record_message(&mut self) {
        self.message_count = self.message_count.saturating_add(1);
    }

    /// Snapshot without key material.
    pub fn metadata(&self) -> SessionKeyMetadata {
        SessionKeyMetadata {
            group_id: self.group_id,
            key_id: self.key_id,
            generation: self.generation,
            message_count: self.message_count,
            created_at: self.created_at,
            expires_at: self.expires_at,
            max_messages: self.max_messages,
            origin: self.origin,
        }
    }
}

/// Everything about a session key except its material.
///
/// The only key-state view handed to persistence or audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeyMetadata {
    /// Group the key belongs to
    pub group_id: GroupId,
    /// Identifier of the key
    pub key_id: KeyId,
    /// Rotation generation
    pub generation: u32,
    /// Messages sealed under the key
    pub message_count: u64,
    /// Creation time, seconds since the Unix epoch
    pub created_at: u64,
    /// Expiry time, seconds since the Unix epoch
    pub expires_at: u64,
    /// Message budget
    pub max_messages: u64,
    /// Local or imported
    pub origin: KeyOrigin,
}
