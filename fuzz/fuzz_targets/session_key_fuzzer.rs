//! Fuzz target for the session key lifecycle
//!
//! Drives a `SessionKeyManager` through arbitrary sequences of encryption,
//! decryption, rotation, clock jumps, membership changes, teardown and
//! injected primitive failures.
//!
//! # Invariants
//!
//! - No operation panics
//! - Generation never decreases while the group stays initialized
//! - The rotation log grows by exactly one entry per successful rotation and
//!   never shrinks, even across teardown
//! - With unbounded retention every message sealed since initialization
//!   decrypts to its plaintext
//! - Corrupted ciphertext never decrypts
//! - A failed operation leaves generation and log unchanged

#![no_main]

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use arbitrary::Arbitrary;
use cloak_core::{
    env::Environment, EncryptedMessage, GroupId, RotationPolicy, RotationReason, SessionKeyManager,
};
use cloak_crypto::{
    testing::{Primitive, SeededProvider},
    Hash,
};
use libfuzzer_sys::fuzz_target;

#[derive(Clone)]
struct FuzzEnv {
    clock: Arc<AtomicU64>,
}

impl Environment for FuzzEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        Duration::from_secs(self.clock.load(Ordering::SeqCst))
    }

    fn wall_clock_secs(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.clock.fetch_add(duration.as_secs(), Ordering::SeqCst);
        async {}
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct SessionScenario {
    seed: u64,
    /// Message budget per key (clamped to 1..=16)
    max_messages: u8,
    /// Key lifetime in seconds (clamped to 1..=3600)
    max_duration: u16,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    Encrypt { message: Vec<u8> },
    DecryptTampered { index: u8, byte: u8 },
    Rotate,
    AdvanceClock { secs: u16 },
    MemberJoined,
    MemberLeft,
    Teardown,
    Initialize,
    FailSeal(bool),
    FailGenerateKey(bool),
}

const GROUP: GroupId = GroupId::new([0x5A; 32]);

fuzz_target!(|scenario: SessionScenario| {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime builds");
    runtime.block_on(run(scenario));
});

async fn run(scenario: SessionScenario) {
    let provider = SeededProvider::new(scenario.seed);
    let env = FuzzEnv { clock: Arc::new(AtomicU64::new(1_700_000_000)) };
    let policy = RotationPolicy {
        max_messages: u64::from(scenario.max_messages.clamp(1, 16)),
        max_duration: Duration::from_secs(u64::from(scenario.max_duration.clamp(1, 3600))),
        ..RotationPolicy::default()
    };
    let mut manager = SessionKeyManager::new(provider.clone(), env.clone(), policy, Hash::ZERO);
    manager.initialize_group(GROUP).await.expect("first initialization succeeds");

    // Messages sealed since the last initialization
    let mut sent: Vec<(EncryptedMessage, Vec<u8>)> = Vec::new();

    for op in scenario.operations {
        let generation_before = manager.current_generation(&GROUP).ok();
        let log_before = manager.history(&GROUP).len();

        match op {
            Operation::Encrypt { message } => match manager.encrypt(GROUP, &message).await {
                Ok(sealed) => {
                    let rotated = manager.history(&GROUP).len() - log_before;
                    assert!(rotated <= 1, "at most one rotation per encryption");
                    assert_eq!(Some(sealed.generation), manager.current_generation(&GROUP).ok());
                    sent.push((sealed, message));
                },
                Err(_) => {
                    assert_eq!(manager.current_generation(&GROUP).ok(), generation_before);
                    assert_eq!(manager.history(&GROUP).len(), log_before);
                },
            },
            Operation::DecryptTampered { index, byte } => {
                if let Some((sealed, _)) = sent.get(index as usize % sent.len().max(1)) {
                    let mut tampered = sealed.clone();
                    let position = byte as usize % tampered.content.len();
                    tampered.content[position] ^= byte | 1;
                    assert!(manager.decrypt(GROUP, &tampered).await.is_err());
                }
            },
            Operation::Rotate => {
                let result = manager.rotate(GROUP, RotationReason::Manual).await;
                let grown = manager.history(&GROUP).len() - log_before;
                assert_eq!(grown, usize::from(result.is_ok()));
            },
            Operation::AdvanceClock { secs } => {
                env.sleep(Duration::from_secs(u64::from(secs))).await;
            },
            Operation::MemberJoined => {
                let _ = manager.on_member_joined(GROUP).await;
            },
            Operation::MemberLeft => {
                let _ = manager.on_member_left(GROUP).await;
            },
            Operation::Teardown => {
                if manager.teardown_group(GROUP).is_ok() {
                    sent.clear();
                }
            },
            Operation::Initialize => {
                if manager.initialize_group(GROUP).await.is_ok() {
                    assert_eq!(generation_before, None);
                    assert_eq!(manager.current_generation(&GROUP).ok(), Some(0));
                }
            },
            Operation::FailSeal(failing) => provider.set_failing(Primitive::Seal, failing),
            Operation::FailGenerateKey(failing) => {
                provider.set_failing(Primitive::GenerateKey, failing);
            },
        }

        // INVARIANT: generation only moves forward while initialized
        if let (Some(before), Some(after)) =
            (generation_before, manager.current_generation(&GROUP).ok())
        {
            assert!(after >= before, "generation went backwards");
        }

        // INVARIANT: log never shrinks
        assert!(manager.history(&GROUP).len() >= log_before, "rotation log shrank");
    }

    // INVARIANT: unbounded retention keeps everything decryptable
    provider.set_failing(Primitive::Open, false);
    for (sealed, plaintext) in &sent {
        let opened = manager.decrypt(GROUP, sealed).await.expect("retained key decrypts");
        assert_eq!(&opened, plaintext);
    }
}
