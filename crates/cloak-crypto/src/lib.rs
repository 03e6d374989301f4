//! Cloak Cryptographic Primitives
//!
//! Capability layer for the Cloak privacy core. The core never names a
//! concrete primitive: it is handed a [`CryptoProvider`] (session keys) and a
//! [`MerkleHasher`] (membership tree) at construction time.
//!
//! # Key Lifecycle
//!
//! ```text
//! CryptoProvider::generate_key
//!        │
//!        ▼
//! Session Key (per group, per generation)
//!        │
//!        ▼
//! AEAD seal (fresh 24-byte nonce per call) → Ciphertext
//! ```
//!
//! Rotation draws fresh key material instead of deriving it from the
//! previous generation, so a compromised key reveals neither earlier nor
//! later generations.
//!
//! Key distribution to peers uses X25519 key agreement and HKDF to wrap the
//! current session key for a single recipient.
//!
//! # Security
//!
//! - Secret values ([`KeyMaterial`], [`AgreementSecret`], [`SharedSecret`])
//!   are zeroized on drop and never implement `Serialize`
//! - Nonces are generated inside [`CryptoProvider::seal`], never by callers
//! - XChaCha20-Poly1305 rejects tampered ciphertext or mismatched associated
//!   data

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod hasher;
mod provider;
mod rust_crypto;
#[cfg(feature = "test-utils")]
pub mod testing;
mod types;

pub use error::CryptoError;
pub use hasher::{MerkleHasher, Sha256Hasher};
pub use provider::CryptoProvider;
pub use rust_crypto::RustCryptoProvider;
pub use types::{
    AgreementKeyPair, AgreementSecret, HASH_SIZE, Hash, KEY_ID_SIZE, KEY_SIZE, KeyId, KeyMaterial,
    NONCE_SIZE, Nonce, PublicKey, Sealed, SharedSecret,
};
