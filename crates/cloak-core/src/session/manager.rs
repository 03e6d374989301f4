//! Per-group session key lifecycle.

use std::collections::{HashMap, VecDeque};

use cloak_crypto::{
    AgreementSecret, CryptoError, CryptoProvider, Hash, KeyId, KeyMaterial, PublicKey,
    SharedSecret,
};
use zeroize::Zeroizing;

use super::{
    key::{KeyLifetime, KeyOrigin, SessionKey, SessionKeyMetadata},
    message::{EncryptedMessage, KeyShare, RotationEvent},
    policy::{RotationPolicy, RotationReason},
};
use crate::{env::Environment, error::SessionError, ids::GroupId};

/// Domain label for deriving a key identifier from key material
const KEY_ID_DOMAIN: &[u8] = b"cloak/session/key-id";

/// Domain label for sender commitments
const SENDER_COMMITMENT_DOMAIN: &[u8] = b"cloak/session/sender-commitment";

/// HKDF info prefix for key-share wrapping keys
const KEY_SHARE_INFO: &[u8] = b"cloak/session/key-share";

/// Keys of one initialized group.
#[derive(Debug)]
struct GroupKeys {
    current: SessionKey,
    /// Previous and imported keys, ordered by generation, oldest first.
    retained: VecDeque<SessionKey>,
}

impl GroupKeys {
    fn find(&self, key_id: &KeyId) -> Option<&SessionKey> {
        if self.current.key_id() == *key_id {
            return Some(&self.current);
        }
        self.retained.iter().find(|key| key.key_id() == *key_id)
    }

    /// Whether a retained key of `generation` would survive pruning.
    fn has_room_for(&self, generation: u32, limit: Option<usize>) -> bool {
        let Some(limit) = limit else {
            return true;
        };

        self.retained.len() < limit
            || self.retained.front().is_some_and(|oldest| oldest.generation() <= generation)
    }

    /// Insert `key` in generation order and prune down to `limit`.
    fn retain(&mut self, group_id: GroupId, key: SessionKey, limit: Option<usize>) {
        let position =
            self.retained.partition_point(|held| held.generation() <= key.generation());
        self.retained.insert(position, key);
        self.prune(group_id, limit);
    }

    /// Drop the lowest generations beyond `limit`. Dropping zeroizes.
    fn prune(&mut self, group_id: GroupId, limit: Option<usize>) {
        let Some(limit) = limit else {
            return;
        };

        while self.retained.len() > limit {
            let Some(dropped) = self.retained.pop_front() else {
                break;
            };
            tracing::debug!(
                group = %group_id,
                key_id = %dropped.key_id(),
                generation = dropped.generation(),
                "Pruned retained session key"
            );
        }
    }
}

/// Owns the session keys and rotation log of every group of one session.
///
/// One explicitly owned manager per session; there is no global key store.
/// Every mutating operation takes `&mut self`, so the read-modify-write of a
/// group's key state can never interleave. Hosts that need shared access
/// use [`super::SharedSessionKeyManager`].
///
/// # Invariants
///
/// - Exactly one current key per initialized group
/// - `generation` of the current key only increases until teardown
/// - The rotation log is append-only and survives teardown
/// - A failed primitive call leaves keys, counters and log untouched
#[derive(Debug)]
pub struct SessionKeyManager<C, E> {
    provider: C,
    env: E,
    policy: RotationPolicy,
    /// Commitment to this participant's identity, bound into every message.
    identity_commitment: Hash,
    groups: HashMap<GroupId, GroupKeys>,
    history: HashMap<GroupId, Vec<RotationEvent>>,
}

impl<C: CryptoProvider, E: Environment> SessionKeyManager<C, E> {
    /// Create a manager with no groups.
    pub fn new(provider: C, env: E, policy: RotationPolicy, identity_commitment: Hash) -> Self {
        Self {
            provider,
            env,
            policy,
            identity_commitment,
            groups: HashMap::new(),
            history: HashMap::new(),
        }
    }

    /// Rotation policy in effect.
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Whether `group_id` currently has keys.
    pub fn is_initialized(&self, group_id: &GroupId) -> bool {
        self.groups.contains_key(group_id)
    }

    /// Create the generation-0 key for `group_id`.
    ///
    /// Initialization is not a rotation and adds nothing to the log.
    ///
    /// # Errors
    ///
    /// - `AlreadyInitialized` if the group has keys
    /// - `Crypto` if key generation fails
    pub async fn initialize_group(&mut self, group_id: GroupId) -> Result<(), SessionError> {
        if self.groups.contains_key(&group_id) {
            return Err(SessionError::AlreadyInitialized { group_id });
        }

        let now = self.env.wall_clock_secs();
        let key = self.generate_key(group_id, 0, now).await?;

        tracing::info!(group = %group_id, key_id = %key.key_id(), "Initialized group session");

        self.groups.insert(group_id, GroupKeys { current: key, retained: VecDeque::new() });
        Ok(())
    }

    /// Encrypt `plaintext` for `group_id`.
    ///
    /// Evaluates the rotation policy first and rotates if the current key is
    /// exhausted or expired. The replacement key is only committed once the
    /// message has been sealed, so a failure anywhere leaves the group as it
    /// was.
    ///
    /// # Errors
    ///
    /// - `GroupNotInitialized` if the group has no keys
    /// - `GenerationOverflow` if a due rotation cannot advance the generation
    /// - `Crypto` if a primitive fails
    pub async fn encrypt(
        &mut self,
        group_id: GroupId,
        plaintext: &[u8],
    ) -> Result<EncryptedMessage, SessionError> {
        let now = self.env.wall_clock_secs();
        let keys =
            self.groups.get(&group_id).ok_or(SessionError::GroupNotInitialized { group_id })?;

        let pending = match self.policy.evaluate(&keys.current, now) {
            Some(reason) => Some((reason, self.next_key(group_id, &keys.current, now).await?)),
            None => None,
        };
        let key = pending.as_ref().map_or(&keys.current, |(_, next)| next);

        let aad = message_aad(&group_id, &key.key_id(), key.generation());
        let sealed = self
            .provider
            .seal(key.material(), &aad, plaintext)
            .await
            .map_err(primitive_failure(group_id, "seal"))?;
        let sender_commitment = self.sender_commitment(group_id, key.key_id()).await?;

        let message = EncryptedMessage {
            content: sealed.ciphertext,
            key_id: key.key_id(),
            nonce: sealed.nonce,
            generation: key.generation(),
            sender_commitment,
            timestamp: now,
        };

        if let Some((reason, next)) = pending {
            self.commit_rotation(group_id, next, reason, now)?;
        }

        let keys =
            self.groups.get_mut(&group_id).ok_or(SessionError::GroupNotInitialized { group_id })?;
        keys.current.record_message();

        Ok(message)
    }

    /// Decrypt a message for `group_id` with the current or a retained key.
    ///
    /// # Errors
    ///
    /// - `GroupNotInitialized` if the group has no keys
    /// - `KeyNotFound` if no held key matches (recoverable by key sync)
    /// - `DecryptionFailed` if authentication fails
    pub async fn decrypt(
        &self,
        group_id: GroupId,
        message: &EncryptedMessage,
    ) -> Result<Vec<u8>, SessionError> {
        let keys =
            self.groups.get(&group_id).ok_or(SessionError::GroupNotInitialized { group_id })?;

        let Some(key) = keys.find(&message.key_id) else {
            tracing::warn!(
                group = %group_id,
                key_id = %message.key_id,
                generation = message.generation,
                "No session key for message"
            );
            return Err(SessionError::KeyNotFound { group_id, key_id: message.key_id });
        };

        // The claimed generation goes into the AAD, so a relabelled message
        // fails authentication
        let aad = message_aad(&group_id, &message.key_id, message.generation);
        self.provider.open(key.material(), &message.nonce, &aad, &message.content).await.map_err(
            |err| SessionError::DecryptionFailed { key_id: key.key_id(), reason: err.to_string() },
        )
    }

    /// Replace the current key of `group_id` with a fresh one.
    ///
    /// The new key is fully constructed before anything is committed.
    ///
    /// # Errors
    ///
    /// - `GroupNotInitialized` if the group has no keys
    /// - `GenerationOverflow` if the generation cannot advance
    /// - `Crypto` if key generation fails (state unchanged)
    pub async fn rotate(
        &mut self,
        group_id: GroupId,
        reason: RotationReason,
    ) -> Result<RotationEvent, SessionError> {
        let now = self.env.wall_clock_secs();
        let keys =
            self.groups.get(&group_id).ok_or(SessionError::GroupNotInitialized { group_id })?;
        let next = self.next_key(group_id, &keys.current, now).await?;

        self.commit_rotation(group_id, next, reason, now)
    }

    /// Generation of the current key.
    pub fn current_generation(&self, group_id: &GroupId) -> Result<u32, SessionError> {
        self.groups
            .get(group_id)
            .map(|keys| keys.current.generation())
            .ok_or(SessionError::GroupNotInitialized { group_id: *group_id })
    }

    /// Full rotation log of `group_id`, oldest first.
    ///
    /// Empty for groups that never rotated. Kept across teardown.
    pub fn history(&self, group_id: &GroupId) -> &[RotationEvent] {
        self.history.get(group_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Drop every key of `group_id`. The rotation log is kept.
    ///
    /// A later `initialize_group` starts again at generation 0.
    pub fn teardown_group(&mut self, group_id: GroupId) -> Result<(), SessionError> {
        let keys =
            self.groups.remove(&group_id).ok_or(SessionError::GroupNotInitialized { group_id })?;

        tracing::info!(
            group = %group_id,
            generation = keys.current.generation(),
            retained = keys.retained.len(),
            "Tore down group session"
        );
        Ok(())
    }

    /// Rotate with `member_join` if the policy asks for it.
    pub async fn on_member_joined(
        &mut self,
        group_id: GroupId,
    ) -> Result<Option<RotationEvent>, SessionError> {
        self.on_membership_change(
            group_id,
            self.policy.rotate_on_member_join,
            RotationReason::MemberJoin,
        )
        .await
    }

    /// Rotate with `member_leave` if the policy asks for it.
    pub async fn on_member_left(
        &mut self,
        group_id: GroupId,
    ) -> Result<Option<RotationEvent>, SessionError> {
        self.on_membership_change(
            group_id,
            self.policy.rotate_on_member_leave,
            RotationReason::MemberLeave,
        )
        .await
    }

    /// Metadata of the current key followed by retained keys, oldest first.
    pub fn key_metadata(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<SessionKeyMetadata>, SessionError> {
        let keys = self
            .groups
            .get(group_id)
            .ok_or(SessionError::GroupNotInitialized { group_id: *group_id })?;

        Ok(std::iter::once(&keys.current).chain(&keys.retained).map(SessionKey::metadata).collect())
    }

    /// Wrap the current key of `group_id` for the holder of `peer`.
    ///
    /// Uses a one-time agreement key, so two shares of the same key to the
    /// same peer are unlinkable.
    pub async fn seal_key_share(
        &self,
        group_id: GroupId,
        peer: &PublicKey,
    ) -> Result<KeyShare, SessionError> {
        let keys =
            self.groups.get(&group_id).ok_or(SessionError::GroupNotInitialized { group_id })?;
        let key = &keys.current;

        let ephemeral = self
            .provider
            .generate_agreement_keypair()
            .await
            .map_err(primitive_failure(group_id, "generate_agreement_keypair"))?;
        let shared = self
            .provider
            .agree(&ephemeral.secret, peer)
            .await
            .map_err(primitive_failure(group_id, "agree"))?;
        let wrap_key = self.wrapping_key(group_id, &shared, &ephemeral.public).await?;

        let aad = message_aad(&group_id, &key.key_id(), key.generation());
        let sealed = self
            .provider
            .seal(&wrap_key, &aad, key.material().expose_secret())
            .await
            .map_err(primitive_failure(group_id, "seal"))?;

        tracing::debug!(group = %group_id, key_id = %key.key_id(), "Sealed key share");

        Ok(KeyShare {
            group_id,
            key_id: key.key_id(),
            generation: key.generation(),
            expires_at: key.expires_at(),
            ephemeral_public: ephemeral.public,
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext,
        })
    }

    /// Unwrap a key share addressed to `recipient` and retain its key.
    ///
    /// Imported keys are decrypt-only: they never become current and never
    /// change the group's generation. Importing a key that is already held
    /// is a no-op. `Ok` means the key is held once the call returns.
    ///
    /// # Errors
    ///
    /// - `GroupNotInitialized` if the group has no keys
    /// - `RetentionFull` if the retention limit would evict the key at once
    /// - `InvalidKeyShare` if the share is for another group, carries an
    ///   unusable ephemeral key, fails to authenticate or does not match its
    ///   key id
    /// - `Crypto` if a primitive fails
    pub async fn import_key_share(
        &mut self,
        group_id: GroupId,
        share: &KeyShare,
        recipient: &AgreementSecret,
    ) -> Result<KeyId, SessionError> {
        if share.group_id != group_id {
            return Err(SessionError::InvalidKeyShare {
                reason: format!("share is for group {}", share.group_id),
            });
        }

        let keys =
            self.groups.get(&group_id).ok_or(SessionError::GroupNotInitialized { group_id })?;
        if keys.find(&share.key_id).is_some() {
            tracing::debug!(group = %group_id, key_id = %share.key_id, "Key share already held");
            return Ok(share.key_id);
        }

        let limit = self.policy.max_retained_keys;
        if !keys.has_room_for(share.generation, limit) {
            return Err(SessionError::RetentionFull {
                group_id,
                generation: share.generation,
                limit: limit.unwrap_or_default(),
            });
        }

        // A bad ephemeral key is the sender's fault, not a provider failure
        let shared = self
            .provider
            .agree(recipient, &share.ephemeral_public)
            .await
            .map_err(|err| SessionError::InvalidKeyShare { reason: err.to_string() })?;
        let wrap_key = self.wrapping_key(group_id, &shared, &share.ephemeral_public).await?;

        let aad = message_aad(&group_id, &share.key_id, share.generation);
        let bytes = Zeroizing::new(
            self.provider
                .open(&wrap_key, &share.nonce, &aad, &share.ciphertext)
                .await
                .map_err(|err| SessionError::InvalidKeyShare { reason: err.to_string() })?,
        );
        let material = KeyMaterial::from_slice(&bytes)
            .map_err(|err| SessionError::InvalidKeyShare { reason: err.to_string() })?;

        if self.key_id_of(group_id, &material).await? != share.key_id {
            return Err(SessionError::InvalidKeyShare {
                reason: "key id does not match key material".to_string(),
            });
        }

        let lifetime = KeyLifetime {
            created_at: self.env.wall_clock_secs(),
            expires_at: share.expires_at,
            max_messages: self.policy.max_messages,
        };
        let key = SessionKey::new(
            group_id,
            share.key_id,
            material,
            share.generation,
            lifetime,
            KeyOrigin::Imported,
        );

        let keys =
            self.groups.get_mut(&group_id).ok_or(SessionError::GroupNotInitialized { group_id })?;
        keys.retain(group_id, key, limit);

        tracing::info!(
            group = %group_id,
            key_id = %share.key_id,
            generation = share.generation,
            "Imported key share"
        );
        Ok(share.key_id)
    }

    async fn on_membership_change(
        &mut self,
        group_id: GroupId,
        enabled: bool,
        reason: RotationReason,
    ) -> Result<Option<RotationEvent>, SessionError> {
        if !self.groups.contains_key(&group_id) {
            return Err(SessionError::GroupNotInitialized { group_id });
        }

        if !enabled {
            return Ok(None);
        }

        self.rotate(group_id, reason).await.map(Some)
    }

    /// Archive the current key, install `next` and log the rotation.
    fn commit_rotation(
        &mut self,
        group_id: GroupId,
        next: SessionKey,
        reason: RotationReason,
        now: u64,
    ) -> Result<RotationEvent, SessionError> {
        let keys =
            self.groups.get_mut(&group_id).ok_or(SessionError::GroupNotInitialized { group_id })?;

        let old = std::mem::replace(&mut keys.current, next);
        let event = RotationEvent {
            group_id,
            old_key_id: old.key_id(),
            new_key_id: keys.current.key_id(),
            reason,
            generation: keys.current.generation(),
            timestamp: now,
        };

        keys.retain(group_id, old, self.policy.max_retained_keys);
        self.history.entry(group_id).or_default().push(event.clone());

        tracing::info!(
            group = %group_id,
            generation = event.generation,
            %reason,
            old_key_id = %event.old_key_id,
            new_key_id = %event.new_key_id,
            "Rotated session key"
        );

        Ok(event)
    }

    /// Build the successor of `current` without committing it.
    async fn next_key(
        &self,
        group_id: GroupId,
        current: &SessionKey,
        now: u64,
    ) -> Result<SessionKey, SessionError> {
        let generation = current.generation().checked_add(1).ok_or(
            SessionError::GenerationOverflow { group_id, current: current.generation() },
        )?;

        self.generate_key(group_id, generation, now).await
    }

    /// Fresh key material from the provider. Never derived from a previous
    /// key, so generations are independent.
    async fn generate_key(
        &self,
        group_id: GroupId,
        generation: u32,
        now: u64,
    ) -> Result<SessionKey, SessionError> {
        let material = self
            .provider
            .generate_key()
            .await
            .map_err(primitive_failure(group_id, "generate_key"))?;
        let key_id = self.key_id_of(group_id, &material).await?;

        let lifetime = KeyLifetime {
            created_at: now,
            expires_at: self.policy.expiry_from(now),
            max_messages: self.policy.max_messages,
        };
        Ok(SessionKey::new(group_id, key_id, material, generation, lifetime, KeyOrigin::Local))
    }

    /// AEAD key for a key share: the X25519 secret expanded with HKDF under
    /// the group and the sender's ephemeral public key.
    async fn wrapping_key(
        &self,
        group_id: GroupId,
        shared: &SharedSecret,
        ephemeral_public: &PublicKey,
    ) -> Result<KeyMaterial, SessionError> {
        let mut info = Vec::with_capacity(KEY_SHARE_INFO.len() + 32 + 32);
        info.extend_from_slice(KEY_SHARE_INFO);
        info.extend_from_slice(group_id.as_bytes());
        info.extend_from_slice(ephemeral_public.as_bytes());

        self.provider
            .derive_key(shared.expose_secret(), &info)
            .await
            .map_err(primitive_failure(group_id, "derive_key"))
    }

    async fn key_id_of(
        &self,
        group_id: GroupId,
        material: &KeyMaterial,
    ) -> Result<KeyId, SessionError> {
        let digest = self
            .provider
            .hash(KEY_ID_DOMAIN, material.expose_secret())
            .await
            .map_err(primitive_failure(group_id, "hash"))?;

        Ok(KeyId::from_hash(&digest))
    }

    async fn sender_commitment(
        &self,
        group_id: GroupId,
        key_id: KeyId,
    ) -> Result<Hash, SessionError> {
        let mut data = Vec::with_capacity(32 + 16);
        data.extend_from_slice(self.identity_commitment.as_bytes());
        data.extend_from_slice(key_id.as_bytes());

        self.provider
            .hash(SENDER_COMMITMENT_DOMAIN, &data)
            .await
            .map_err(primitive_failure(group_id, "hash"))
    }
}

/// Associated data binding a ciphertext to its group, key and generation.
fn message_aad(group_id: &GroupId, key_id: &KeyId, generation: u32) -> Vec<u8> {
    let mut aad = Vec::with_capacity(32 + 16 + 4);
    aad.extend_from_slice(group_id.as_bytes());
    aad.extend_from_slice(key_id.as_bytes());
    aad.extend_from_slice(&generation.to_be_bytes());
    aad
}

/// Log a provider failure and convert it.
fn primitive_failure(
    group_id: GroupId,
    operation: &'static str,
) -> impl FnOnce(CryptoError) -> SessionError {
    move |err| {
        tracing::error!(group = %group_id, operation, error = %err, "Crypto provider failure");
        SessionError::Crypto(err)
    }
}
