//! Error types for primitive operations

use thiserror::Error;

/// Errors from a [`crate::CryptoProvider`].
///
/// Every variant is fatal for the single call that produced it. Callers must
/// not commit any state derived from a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The entropy source could not produce random bytes
    #[error("randomness unavailable: {reason}")]
    Randomness {
        /// Reason reported by the entropy source
        reason: String,
    },

    /// AEAD encryption failed
    #[error("encryption failed: {reason}")]
    EncryptionFailed {
        /// Reason for encryption failure
        reason: String,
    },

    /// AEAD decryption failed (authentication tag mismatch)
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for decryption failure
        reason: String,
    },

    /// HKDF expansion failed
    #[error("key derivation failed: {reason}")]
    KeyDerivation {
        /// Reason for derivation failure
        reason: String,
    },

    /// Key agreement produced a non-contributory shared secret
    #[error("key agreement failed: {reason}")]
    KeyAgreement {
        /// Reason for agreement failure
        reason: String,
    },

    /// Invalid key material length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },
}

impl From<getrandom::Error> for CryptoError {
    fn from(err: getrandom::Error) -> Self {
        Self::Randomness { reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CryptoError::InvalidKeyLength { expected: 32, actual: 7 };
        assert_eq!(err.to_string(), "invalid key length: expected 32, got 7");
    }

    #[test]
    fn decryption_failure_names_reason() {
        let err = CryptoError::DecryptionFailed { reason: "authentication failed".to_string() };
        assert!(err.to_string().contains("authentication failed"));
    }
}
