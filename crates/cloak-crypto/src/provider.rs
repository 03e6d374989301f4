//! Primitive capability interface.

use std::future::Future;

use crate::{
    error::CryptoError,
    types::{
        AgreementKeyPair, AgreementSecret, Hash, KeyMaterial, Nonce, PublicKey, Sealed,
        SharedSecret,
    },
};

/// Cryptographic primitives supplied by the host.
///
/// All methods are asynchronous so hardware-backed or remote implementations
/// can suspend. None of them block indefinitely and none need cancellation.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `seal()` chooses a fresh nonce on every call; reusing a nonce under the
///   same key breaks confidentiality
/// - `open()` fails when the ciphertext, nonce or associated data were
///   altered
/// - `generate_key()` and `generate_agreement_keypair()` use cryptographically
///   secure entropy in production
/// - A failed call has no observable side effects
pub trait CryptoProvider: Send + Sync {
    /// Hash `data` under a domain label.
    fn hash(
        &self,
        domain: &[u8],
        data: &[u8],
    ) -> impl Future<Output = Result<Hash, CryptoError>> + Send;

    /// Generate fresh random symmetric key material.
    fn generate_key(&self) -> impl Future<Output = Result<KeyMaterial, CryptoError>> + Send;

    /// Derive a symmetric key from input keying material and a context label.
    fn derive_key(
        &self,
        ikm: &[u8],
        info: &[u8],
    ) -> impl Future<Output = Result<KeyMaterial, CryptoError>> + Send;

    /// Encrypt and authenticate `plaintext`, binding `aad`.
    fn seal(
        &self,
        key: &KeyMaterial,
        aad: &[u8],
        plaintext: &[u8],
    ) -> impl Future<Output = Result<Sealed, CryptoError>> + Send;

    /// Authenticate and decrypt `ciphertext` sealed under `nonce` and `aad`.
    fn open(
        &self,
        key: &KeyMaterial,
        nonce: &Nonce,
        aad: &[u8],
        ciphertext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, CryptoError>> + Send;

    /// Generate a fresh key agreement key pair.
    fn generate_agreement_keypair(
        &self,
    ) -> impl Future<Output = Result<AgreementKeyPair, CryptoError>> + Send;

    /// Compute the shared secret between our secret and a peer's public key.
    fn agree(
        &self,
        secret: &AgreementSecret,
        peer: &PublicKey,
    ) -> impl Future<Output = Result<SharedSecret, CryptoError>> + Send;
}
