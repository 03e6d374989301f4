//! Production [`CryptoProvider`] backed by `RustCrypto` and `x25519-dalek`.
//!
//! - Hash: SHA-256 over a length-prefixed domain label
//! - KDF: HKDF-SHA256
//! - AEAD: `XChaCha20-Poly1305` with 192-bit random nonces
//! - Key agreement: X25519
//!
//! Randomness comes from the OS via getrandom. Entropy failure is reported as
//! [`CryptoError::Randomness`] rather than panicking, so the caller can fail
//! the single operation without touching its state.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use x25519_dalek::StaticSecret;

use crate::{
    error::CryptoError,
    provider::CryptoProvider,
    types::{
        AgreementKeyPair, AgreementSecret, Hash, KEY_SIZE, KeyMaterial, NONCE_SIZE, Nonce,
        PublicKey, Sealed, SharedSecret,
    },
};

/// Stateless provider using the `RustCrypto` primitive stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    /// Create a new provider.
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for RustCryptoProvider {
    async fn hash(&self, domain: &[u8], data: &[u8]) -> Result<Hash, CryptoError> {
        Ok(domain_hash(domain, data))
    }

    async fn generate_key(&self) -> Result<KeyMaterial, CryptoError> {
        let mut bytes = [0u8; KEY_SIZE];
        getrandom::fill(&mut bytes)?;
        Ok(KeyMaterial::new(bytes))
    }

    async fn derive_key(&self, ikm: &[u8], info: &[u8]) -> Result<KeyMaterial, CryptoError> {
        hkdf_expand(ikm, info)
    }

    async fn seal(
        &self,
        key: &KeyMaterial,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Sealed, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::fill(&mut nonce)?;
        seal_with_nonce(key, nonce, aad, plaintext)
    }

    async fn open(
        &self,
        key: &KeyMaterial,
        nonce: &Nonce,
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        open_sealed(key, nonce, aad, ciphertext)
    }

    async fn generate_agreement_keypair(&self) -> Result<AgreementKeyPair, CryptoError> {
        let mut bytes = [0u8; 32];
        getrandom::fill(&mut bytes)?;
        Ok(keypair_from_bytes(bytes))
    }

    async fn agree(
        &self,
        secret: &AgreementSecret,
        peer: &PublicKey,
    ) -> Result<SharedSecret, CryptoError> {
        x25519_agree(secret, peer)
    }
}

/// Seal under a caller-chosen nonce. Only the providers call this; the nonce
/// must never repeat under the same key.
pub(crate) fn seal_with_nonce(
    key: &KeyMaterial,
    nonce: Nonce,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Sealed, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.expose_secret().into());
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::EncryptionFailed {
            reason: "AEAD encryption rejected input".to_string(),
        })?;

    Ok(Sealed { nonce, ciphertext })
}

pub(crate) fn open_sealed(
    key: &KeyMaterial,
    nonce: &Nonce,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.expose_secret().into());
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::DecryptionFailed { reason: "authentication failed".to_string() })
}

pub(crate) fn hkdf_expand(ikm: &[u8], info: &[u8]) -> Result<KeyMaterial, CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation { reason: e.to_string() })?;
    Ok(KeyMaterial::new(okm))
}

pub(crate) fn keypair_from_bytes(bytes: [u8; 32]) -> AgreementKeyPair {
    let secret = StaticSecret::from(bytes);
    let public = x25519_dalek::PublicKey::from(&secret);

    AgreementKeyPair {
        secret: AgreementSecret::new(secret.to_bytes()),
        public: PublicKey::new(public.to_bytes()),
    }
}

pub(crate) fn x25519_agree(
    secret: &AgreementSecret,
    peer: &PublicKey,
) -> Result<SharedSecret, CryptoError> {
    let secret = StaticSecret::from(*secret.expose_secret());
    let peer = x25519_dalek::PublicKey::from(*peer.as_bytes());
    let shared = secret.diffie_hellman(&peer);

    // Low-order peer points yield an all-zero secret
    if !shared.was_contributory() {
        return Err(CryptoError::KeyAgreement {
            reason: "peer public key is a low-order point".to_string(),
        });
    }

    Ok(SharedSecret::new(shared.to_bytes()))
}

/// SHA-256 over `len(domain) || domain || data`.
pub(crate) fn domain_hash(domain: &[u8], data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update((domain.len() as u32).to_be_bytes());
    hasher.update(domain);
    hasher.update(data);
    Hash::new(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Poly1305 tag size (16 bytes)
    const POLY1305_TAG_SIZE: usize = 16;

    fn test_key() -> KeyMaterial {
        let mut key = [0u8; KEY_SIZE];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        KeyMaterial::new(key)
    }

    #[tokio::test]
    async fn seal_open_roundtrip() {
        let provider = RustCryptoProvider::new();
        let key = test_key();

        let sealed = provider.seal(&key, b"aad", b"Hello, World!").await.unwrap();
        let opened = provider.open(&key, &sealed.nonce, b"aad", &sealed.ciphertext).await.unwrap();

        assert_eq!(opened, b"Hello, World!");
    }

    #[tokio::test]
    async fn seal_empty_message() {
        let provider = RustCryptoProvider::new();
        let key = test_key();

        let sealed = provider.seal(&key, b"", b"").await.unwrap();
        assert_eq!(sealed.ciphertext.len(), POLY1305_TAG_SIZE);

        let opened = provider.open(&key, &sealed.nonce, b"", &sealed.ciphertext).await.unwrap();
        assert!(opened.is_empty());
    }

    #[tokio::test]
    async fn every_seal_uses_a_fresh_nonce() {
        let provider = RustCryptoProvider::new();
        let key = test_key();

        let first = provider.seal(&key, b"", b"same plaintext").await.unwrap();
        let second = provider.seal(&key, b"", b"same plaintext").await.unwrap();

        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[tokio::test]
    async fn tampered_ciphertext_fails() {
        let provider = RustCryptoProvider::new();
        let key = test_key();

        let mut sealed = provider.seal(&key, b"aad", b"original message").await.unwrap();
        sealed.ciphertext[0] ^= 0xFF;

        let result = provider.open(&key, &sealed.nonce, b"aad", &sealed.ciphertext).await;
        assert!(matches!(
            result,
            Err(CryptoError::DecryptionFailed { reason }) if reason.contains("authentication")
        ));
    }

    #[tokio::test]
    async fn mismatched_aad_fails() {
        let provider = RustCryptoProvider::new();
        let key = test_key();

        let sealed = provider.seal(&key, b"group-a", b"secret").await.unwrap();
        let result = provider.open(&key, &sealed.nonce, b"group-b", &sealed.ciphertext).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn wrong_key_fails() {
        let provider = RustCryptoProvider::new();

        let sealed = provider.seal(&test_key(), b"", b"secret").await.unwrap();
        let other = KeyMaterial::new([0xFF; KEY_SIZE]);
        let result = provider.open(&other, &sealed.nonce, b"", &sealed.ciphertext).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn generated_keys_differ() {
        let provider = RustCryptoProvider::new();

        let a = provider.generate_key().await.unwrap();
        let b = provider.generate_key().await.unwrap();

        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[tokio::test]
    async fn derive_key_is_deterministic() {
        let provider = RustCryptoProvider::new();

        let a = provider.derive_key(b"input keying material", b"info").await.unwrap();
        let b = provider.derive_key(b"input keying material", b"info").await.unwrap();
        let c = provider.derive_key(b"input keying material", b"other").await.unwrap();

        assert_eq!(a.expose_secret(), b.expose_secret());
        assert_ne!(a.expose_secret(), c.expose_secret());
    }

    #[tokio::test]
    async fn key_agreement_is_symmetric() {
        let provider = RustCryptoProvider::new();

        let alice = provider.generate_agreement_keypair().await.unwrap();
        let bob = provider.generate_agreement_keypair().await.unwrap();

        let alice_shared = provider.agree(&alice.secret, &bob.public).await.unwrap();
        let bob_shared = provider.agree(&bob.secret, &alice.public).await.unwrap();

        assert_eq!(alice_shared.expose_secret(), bob_shared.expose_secret());
    }

    #[tokio::test]
    async fn low_order_peer_key_is_rejected() {
        let provider = RustCryptoProvider::new();
        let ours = provider.generate_agreement_keypair().await.unwrap();

        let result = provider.agree(&ours.secret, &PublicKey::new([0u8; 32])).await;
        assert!(matches!(result, Err(CryptoError::KeyAgreement { .. })));
    }

    #[tokio::test]
    async fn hash_domains_are_separated() {
        let provider = RustCryptoProvider::new();

        let a = provider.hash(b"domain-a", b"data").await.unwrap();
        let b = provider.hash(b"domain-b", b"data").await.unwrap();
        // Moving bytes between domain and data must not collide
        let c = provider.hash(b"domain-ad", b"ata").await.unwrap();

        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
