//! Property-based tests for the production provider
//!
//! 1. **Round-trip**: open(seal(m, aad), aad) == m for all messages
//! 2. **Integrity**: flipping any ciphertext bit fails authentication
//! 3. **Binding**: a different associated data string fails authentication
//! 4. **Derivation isolation**: distinct info labels give distinct keys

use cloak_crypto::{
    CryptoProvider, KEY_SIZE, KeyMaterial, MerkleHasher, RustCryptoProvider, Sha256Hasher,
};
use proptest::prelude::*;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_seal_open_roundtrip(
        key in any::<[u8; KEY_SIZE]>(),
        aad in prop::collection::vec(any::<u8>(), 0..64),
        plaintext in prop::collection::vec(any::<u8>(), 0..1000),
    ) {
        let provider = RustCryptoProvider::new();
        let key = KeyMaterial::new(key);

        let opened = block_on(async {
            let sealed = provider.seal(&key, &aad, &plaintext).await.unwrap();
            provider.open(&key, &sealed.nonce, &aad, &sealed.ciphertext).await.unwrap()
        });

        prop_assert_eq!(opened, plaintext);
    }

    #[test]
    fn prop_any_bit_flip_is_rejected(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let provider = RustCryptoProvider::new();
        let key = KeyMaterial::new([0x42; KEY_SIZE]);

        let result = block_on(async {
            let mut sealed = provider.seal(&key, b"aad", &plaintext).await.unwrap();
            let index = position.index(sealed.ciphertext.len());
            sealed.ciphertext[index] ^= 1 << bit;
            provider.open(&key, &sealed.nonce, b"aad", &sealed.ciphertext).await
        });

        prop_assert!(result.is_err());
    }

    #[test]
    fn prop_associated_data_is_bound(
        aad in prop::collection::vec(any::<u8>(), 0..64),
        other in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        prop_assume!(aad != other);
        let provider = RustCryptoProvider::new();
        let key = KeyMaterial::new([0x07; KEY_SIZE]);

        let result = block_on(async {
            let sealed = provider.seal(&key, &aad, b"payload").await.unwrap();
            provider.open(&key, &sealed.nonce, &other, &sealed.ciphertext).await
        });

        prop_assert!(result.is_err());
    }

    #[test]
    fn prop_derivation_isolates_labels(
        ikm in prop::collection::vec(any::<u8>(), 1..64),
        info_a in prop::collection::vec(any::<u8>(), 0..32),
        info_b in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let provider = RustCryptoProvider::new();

        let (a, again, b) = block_on(async {
            (
                provider.derive_key(&ikm, &info_a).await.unwrap(),
                provider.derive_key(&ikm, &info_a).await.unwrap(),
                provider.derive_key(&ikm, &info_b).await.unwrap(),
            )
        });

        prop_assert_eq!(a.expose_secret(), again.expose_secret());
        if info_a != info_b {
            prop_assert_ne!(a.expose_secret(), b.expose_secret());
        }
    }

    #[test]
    fn prop_leaves_never_equal_nodes(data in prop::collection::vec(any::<u8>(), 64..=64)) {
        let hasher = Sha256Hasher;
        let mut left = [0u8; 32];
        let mut right = [0u8; 32];
        left.copy_from_slice(&data[..32]);
        right.copy_from_slice(&data[32..]);

        let as_leaf = hasher.hash_leaf(&data);
        let as_node = hasher.hash_pair(&left.into(), &right.into());

        prop_assert_ne!(as_leaf, as_node);
    }
}
