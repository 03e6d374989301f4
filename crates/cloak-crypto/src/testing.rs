//! Deterministic provider for tests and simulation.
//!
//! [`SeededProvider`] draws every key, nonce and key pair from a seeded
//! `ChaCha20` RNG, so a test run is reproducible from its seed. Individual
//! primitives can be switched to fail to exercise error paths of callers.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{
    error::CryptoError,
    provider::CryptoProvider,
    rust_crypto::{
        domain_hash, hkdf_expand, keypair_from_bytes, open_sealed, seal_with_nonce, x25519_agree,
    },
    types::{
        AgreementKeyPair, AgreementSecret, Hash, KEY_SIZE, KeyMaterial, NONCE_SIZE, Nonce,
        PublicKey, Sealed, SharedSecret,
    },
};

/// Primitive that a [`SeededProvider`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// `hash`
    Hash,
    /// `generate_key`
    GenerateKey,
    /// `seal`
    Seal,
    /// `open`
    Open,
}

#[derive(Debug)]
struct Inner {
    rng: Mutex<ChaCha20Rng>,
    fail_hash: AtomicBool,
    fail_generate_key: AtomicBool,
    fail_seal: AtomicBool,
    fail_open: AtomicBool,
    seal_calls: AtomicU64,
}

/// Reproducible [`CryptoProvider`] with failure injection.
///
/// Cloning shares the RNG and failure switches, so a test can keep a handle
/// after moving the provider into the code under test.
#[derive(Debug, Clone)]
pub struct SeededProvider {
    inner: Arc<Inner>,
}

impl SeededProvider {
    /// Create a provider from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
                fail_hash: AtomicBool::new(false),
                fail_generate_key: AtomicBool::new(false),
                fail_seal: AtomicBool::new(false),
                fail_open: AtomicBool::new(false),
                seal_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Make every subsequent call to `primitive` fail (or succeed again).
    pub fn set_failing(&self, primitive: Primitive, failing: bool) {
        self.switch(primitive).store(failing, Ordering::SeqCst);
    }

    /// Number of successful `seal` calls so far.
    pub fn seal_calls(&self) -> u64 {
        self.inner.seal_calls.load(Ordering::SeqCst)
    }

    fn switch(&self, primitive: Primitive) -> &AtomicBool {
        match primitive {
            Primitive::Hash => &self.inner.fail_hash,
            Primitive::GenerateKey => &self.inner.fail_generate_key,
            Primitive::Seal => &self.inner.fail_seal,
            Primitive::Open => &self.inner.fail_open,
        }
    }

    fn check(&self, primitive: Primitive) -> Result<(), CryptoError> {
        if self.switch(primitive).load(Ordering::SeqCst) {
            return Err(CryptoError::Randomness {
                reason: format!("injected {primitive:?} failure"),
            });
        }
        Ok(())
    }

    fn fill(&self, buffer: &mut [u8]) {
        self.inner.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}

impl CryptoProvider for SeededProvider {
    async fn hash(&self, domain: &[u8], data: &[u8]) -> Result<Hash, CryptoError> {
        self.check(Primitive::Hash)?;
        Ok(domain_hash(domain, data))
    }

    async fn generate_key(&self) -> Result<KeyMaterial, CryptoError> {
        self.check(Primitive::GenerateKey)?;
        let mut bytes = [0u8; KEY_SIZE];
        self.fill(&mut bytes);
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
        self.check(Primitive::Seal)?;
        let mut nonce = [0u8; NONCE_SIZE];
        self.fill(&mut nonce);
        let sealed = seal_with_nonce(key, nonce, aad, plaintext)?;
        self.inner.seal_calls.fetch_add(1, Ordering::SeqCst);
        Ok(sealed)
    }

    async fn open(
        &self,
        key: &KeyMaterial,
        nonce: &Nonce,
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.check(Primitive::Open)?;
        open_sealed(key, nonce, aad, ciphertext)
    }

    async fn generate_agreement_keypair(&self) -> Result<AgreementKeyPair, CryptoError> {
        let mut bytes = [0u8; 32];
        self.fill(&mut bytes);
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
