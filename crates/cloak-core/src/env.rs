//! Environment abstraction for deterministic testing.
//!
//! Decouples key lifecycle and confirmation polling from system resources
//! (clocks, sleeping). Tests drive a virtual clock; production uses the
//! system clock and Tokio timers.

use std::{future::Future, time::Duration};

/// Abstract environment providing time and async sleeping.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - Methods are infallible except in exceptional circumstances (e.g.
///   incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Wall clock time in seconds since the Unix epoch.
    ///
    /// Used for key expiry and audit timestamps, which must survive process
    /// restarts and therefore cannot use a monotonic instant.
    fn wall_clock_secs(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code (the confirmation poller) sleeps; key lifecycle logic
    /// never does.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}
