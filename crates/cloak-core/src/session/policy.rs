//! Rotation policy and rotation reasons.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use super::key::SessionKey;

/// Default number of messages encrypted under one key
pub const DEFAULT_MAX_MESSAGES: u64 = 1000;

/// Default key lifetime (7 days)
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// When session keys are replaced.
///
/// Configuration only; the manager reads it and never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    /// Rotate before encrypting once a key has sealed this many messages
    pub max_messages: u64,
    /// Rotate before encrypting once a key is this old
    pub max_duration: Duration,
    /// Rotate when a member joins
    pub rotate_on_member_join: bool,
    /// Rotate when a member leaves
    pub rotate_on_member_leave: bool,
    /// Previous keys kept for decryption per group (`None` keeps all)
    pub max_retained_keys: Option<usize>,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_duration: DEFAULT_MAX_DURATION,
            rotate_on_member_join: true,
            rotate_on_member_leave: true,
            max_retained_keys: None,
        }
    }
}

impl RotationPolicy {
    /// Decide whether `key` must be replaced before its next encryption.
    ///
    /// The message budget is checked before expiry, so a key that is both
    /// exhausted and expired reports `MaxMessages`.
    pub fn evaluate(&self, key: &SessionKey, now_secs: u64) -> Option<RotationReason> {
        if key.message_count() >= key.max_messages() {
            Some(RotationReason::MaxMessages)
        } else if now_secs >= key.expires_at() {
            Some(RotationReason::MaxDuration)
        } else {
            None
        }
    }

    /// Expiry timestamp for a key created at `now_secs`.
    pub(crate) fn expiry_from(&self, now_secs: u64) -> u64 {
        now_secs.saturating_add(self.max_duration.as_secs())
    }
}

/// Why a key was rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationReason {
    /// The key reached its message budget
    MaxMessages,
    /// The key reached its lifetime
    MaxDuration,
    /// A member joined the group
    MemberJoin,
    /// A member left the group
    MemberLeave,
    /// Requested by the host
    Manual,
}

impl RotationReason {
    /// Wire name of the reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaxMessages => "max_messages",
            Self::MaxDuration => "max_duration",
            Self::MemberJoin => "member_join",
            Self::MemberLeave => "member_leave",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use cloak_crypto::{KeyId, KeyMaterial};

    use super::*;
    use crate::{
        ids::GroupId,
        session::key::{KeyLifetime, KeyOrigin},
    };

    fn key(message_count: u64, max_messages: u64, expires_at: u64) -> SessionKey {
        let mut key = SessionKey::new(
            GroupId::new([7; 32]),
            KeyId::new([1; 16]),
            KeyMaterial::new([2; 32]),
            0,
            KeyLifetime { created_at: 0, expires_at, max_messages },
            KeyOrigin::Local,
        );
        for _ in 0..message_count {
            key.record_message();
        }
        key
    }

    #[test]
    fn defaults() {
        let policy = RotationPolicy::default();

        assert_eq!(policy.max_messages, 1000);
        assert_eq!(policy.max_duration, Duration::from_secs(604_800));
        assert!(policy.rotate_on_member_join);
        assert!(policy.rotate_on_member_leave);
        assert_eq!(policy.max_retained_keys, None);
    }

    #[test]
    fn fresh_key_needs_no_rotation() {
        let policy = RotationPolicy::default();
        assert_eq!(policy.evaluate(&key(0, 2, 100), 50), None);
    }

    #[test]
    fn exhausted_key_rotates_for_messages() {
        let policy = RotationPolicy::default();
        assert_eq!(policy.evaluate(&key(2, 2, 100), 50), Some(RotationReason::MaxMessages));
    }

    #[test]
    fn expired_key_rotates_for_duration() {
        let policy = RotationPolicy::default();
        assert_eq!(policy.evaluate(&key(0, 2, 100), 100), Some(RotationReason::MaxDuration));
    }

    #[test]
    fn message_budget_wins_over_expiry() {
        let policy = RotationPolicy::default();
        assert_eq!(policy.evaluate(&key(2, 2, 100), 500), Some(RotationReason::MaxMessages));
    }

    #[test]
    fn expiry_saturates() {
        let policy = RotationPolicy { max_duration: Duration::MAX, ..RotationPolicy::default() };
        assert_eq!(policy.expiry_from(10), u64::MAX);
    }

    #[test]
    fn reason_wire_names() {
        let names: Vec<&str> = [
            RotationReason::MaxMessages,
            RotationReason::MaxDuration,
            RotationReason::MemberJoin,
            RotationReason::MemberLeave,
            RotationReason::Manual,
        ]
        .into_iter()
        .map(RotationReason::as_str)
        .collect();

        assert_eq!(
            names,
            ["max_messages", "max_duration", "member_join", "member_leave", "manual"]
        );
    }
}
