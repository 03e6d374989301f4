//! Fuzz target for proofs arriving over the wire
//!
//! Feeds arbitrary bytes to the CBOR decoder a verifier would run before
//! checking a proof.
//!
//! # Invariants
//!
//! - Decoding never panics
//! - Verification of any decodable proof never panics
//! - Re-encoding a decoded proof decodes to the same proof

#![no_main]

use cloak_core::{MembershipProof, verify_membership};
use cloak_crypto::Sha256Hasher;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(proof) = ciborium::from_reader::<MembershipProof, _>(data) else {
        return;
    };

    let _ = verify_membership(&Sha256Hasher, &proof);

    let mut encoded = Vec::new();
    ciborium::into_writer(&proof, &mut encoded).expect("encoding to memory cannot fail");
    let decoded: MembershipProof =
        ciborium::from_reader(encoded.as_slice()).expect("re-encoded proof must decode");
    assert_eq!(decoded, proof);
});
