//! Shared access to a session key manager.

use std::sync::Arc;

use cloak_crypto::CryptoProvider;
use tokio::sync::{Mutex, MutexGuard};

use super::{
    manager::SessionKeyManager,
    message::{EncryptedMessage, RotationEvent},
    policy::RotationReason,
};
use crate::{env::Environment, error::SessionError, ids::GroupId};

/// A [`SessionKeyManager`] behind an async mutex.
///
/// Every operation holds the lock for its whole duration, including provider
/// calls, so operations on the same manager are serialized exactly as with
/// `&mut` access. Cloning shares the manager.
pub struct SharedSessionKeyManager<C, E> {
    inner: Arc<Mutex<SessionKeyManager<C, E>>>,
}

impl<C, E> Clone for SharedSessionKeyManager<C, E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: CryptoProvider, E: Environment> SharedSessionKeyManager<C, E> {
    /// Share `manager`.
    pub fn new(manager: SessionKeyManager<C, E>) -> Self {
        Self { inner: Arc::new(Mutex::new(manager)) }
    }

    /// Exclusive access for operations not forwarded here.
    pub async fn lock(&self) -> MutexGuard<'_, SessionKeyManager<C, E>> {
        self.inner.lock().await
    }

    /// See [`SessionKeyManager::initialize_group`].
    pub async fn initialize_group(&self, group_id: GroupId) -> Result<(), SessionError> {
        self.inner.lock().await.initialize_group(group_id).await
    }

    /// See [`SessionKeyManager::encrypt`].
    pub async fn encrypt(
        &self,
        group_id: GroupId,
        plaintext: &[u8],
    ) -> Result<EncryptedMessage, SessionError> {
        self.inner.lock().await.encrypt(group_id, plaintext).await
    }

    /// See [`SessionKeyManager::decrypt`].
    pub async fn decrypt(
        &self,
        group_id: GroupId,
        message: &EncryptedMessage,
    ) -> Result<Vec<u8>, SessionError> {
        self.inner.lock().await.decrypt(group_id, message).await
    }

    /// See [`SessionKeyManager::rotate`].
    pub async fn rotate(
        &self,
        group_id: GroupId,
        reason: RotationReason,
    ) -> Result<RotationEvent, SessionError> {
        self.inner.lock().await.rotate(group_id, reason).await
    }

    /// See [`SessionKeyManager::current_generation`].
    pub async fn current_generation(&self, group_id: GroupId) -> Result<u32, SessionError> {
        self.inner.lock().await.current_generation(&group_id)
    }

    /// Copy of the rotation log. See [`SessionKeyManager::history`].
    pub async fn history(&self, group_id: GroupId) -> Vec<RotationEvent> {
        self.inner.lock().await.history(&group_id).to_vec()
    }
}
