//! Session key management: per-group symmetric keys with policy-driven
//! rotation and an append-only rotation log.
//!
//! # Architecture
//!
//! ```text
//! initialize_group ──▶ generation 0
//!                          │
//!        encrypt ──▶ RotationPolicy::evaluate ──▶ rotate (fresh key, gen + 1)
//!                          │                           │
//!                          ▼                           ▼
//!                  seal under current key     RotationEvent appended
//! ```
//!
//! Previous keys are retained for decryption (optionally bounded) until the
//! group is torn down. Keys can be handed to peers as [`KeyShare`]s.

mod key;
mod manager;
mod message;
mod policy;
mod shared;

pub use key::{KeyOrigin, SessionKey, SessionKeyMetadata};
pub use manager::SessionKeyManager;
pub use message::{EncryptedMessage, KeyShare, RotationEvent};
pub use policy::{DEFAULT_MAX_DURATION, DEFAULT_MAX_MESSAGES, RotationPolicy, RotationReason};
pub use shared::SharedSessionKeyManager;

pub use crate::error::SessionError;
