//! Advisory confirmation tracking for submitted messages.
//!
//! After the host submits an encrypted message to an external ledger it can
//! hand the resulting reference to a [`ConfirmationTracker`], which polls a
//! [`StatusSource`] until the reference resolves or runs out of attempts.
//!
//! The tracker shares no state with the session key manager and runs on its
//! own task, so a slow or failing status backend never delays encryption or
//! rotation.
//!
//! ```text
//! host ──track(ref)──▶ ConfirmationTracker ──status(ref)──▶ StatusSource
//!                              │
//!                              ▼ mpsc
//!                     ConfirmationUpdate { reference, outcome, attempts }
//! ```

use std::{fmt, future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::{env::Environment, error::StatusError};

/// Default delay between two polls of the same reference
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of polls before a reference is abandoned
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Default time a single status lookup may take
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Opaque reference returned by the ledger on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxReference(String);

impl TxReference {
    /// Wrap a ledger reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a reference as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Not final yet
    Pending,
    /// Accepted by the ledger
    Confirmed,
    /// Rejected by the ledger
    Failed {
        /// Reason reported by the ledger
        reason: String,
    },
}

/// Source of transaction status, supplied by the host.
pub trait StatusSource: Send + Sync {
    /// Look up the current status of `reference`.
    fn status(
        &self,
        reference: &TxReference,
    ) -> impl Future<Output = Result<TransactionStatus, StatusError>> + Send;
}

/// Polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Delay between two polls of the same reference
    pub poll_interval: Duration,
    /// Polls before a reference is abandoned
    pub max_attempts: u32,
    /// Time one lookup may take before it counts as a failed attempt
    pub lookup_timeout: Duration,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

/// Final state of a tracked reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The ledger confirmed the reference
    Confirmed,
    /// The ledger rejected the reference
    Failed {
        /// Reason reported by the ledger
        reason: String,
    },
    /// No final status within `max_attempts` polls
    Abandoned,
}

/// Emitted once per tracked reference when it resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationUpdate {
    /// The resolved reference
    pub reference: TxReference,
    /// How it resolved
    pub outcome: ConfirmationOutcome,
    /// Polls made, including the resolving one
    pub attempts: u32,
}

#[derive(Debug)]
struct PendingItem<I> {
    reference: TxReference,
    attempts: u32,
    /// Time of the last poll, or of tracking if never polled.
    since: I,
}

/// Polls pending references independently until each resolves.
pub struct ConfirmationTracker<S, E: Environment> {
    source: S,
    env: E,
    config: ConfirmationConfig,
    pending: Vec<PendingItem<E::Instant>>,
    updates: mpsc::Sender<ConfirmationUpdate>,
}

impl<S: StatusSource, E: Environment> ConfirmationTracker<S, E> {
    /// Create a tracker that reports resolutions on `updates`.
    pub fn new(
        source: S,
        env: E,
        config: ConfirmationConfig,
        updates: mpsc::Sender<ConfirmationUpdate>,
    ) -> Self {
        Self { source, env, config, pending: Vec::new(), updates }
    }

    /// Start tracking `reference`. Returns false if it is already tracked.
    ///
    /// The first poll happens one interval after tracking.
    pub fn track(&mut self, reference: TxReference) -> bool {
        if self.pending.iter().any(|item| item.reference == reference) {
            return false;
        }

        tracing::debug!(%reference, "Tracking confirmation");
        self.pending.push(PendingItem { reference, attempts: 0, since: self.env.now() });
        true
    }

    /// Number of references not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Poll every reference whose interval has elapsed and publish the ones
    /// that resolved. Returns the number resolved.
    ///
    /// Due lookups run concurrently and each is bounded by
    /// `lookup_timeout`, so a slow reference never holds up the others. A
    /// lookup error or timeout counts as an attempt for that reference only.
    pub async fn poll_due(&mut self) -> usize {
        let now = self.env.now();
        let due: Vec<usize> = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, item)| now - item.since >= self.config.poll_interval)
            .map(|(index, _)| index)
            .collect();

        if due.is_empty() {
            return 0;
        }

        let lookups = due.iter().map(|&index| self.lookup(&self.pending[index].reference));
        let statuses = futures::future::join_all(lookups).await;

        let mut resolved = Vec::new();
        for (index, status) in due.into_iter().zip(statuses) {
            let item = &mut self.pending[index];
            item.since = now;
            item.attempts = item.attempts.saturating_add(1);

            let outcome = match status {
                Ok(TransactionStatus::Pending) => None,
                Ok(TransactionStatus::Confirmed) => Some(ConfirmationOutcome::Confirmed),
                Ok(TransactionStatus::Failed { reason }) => {
                    Some(ConfirmationOutcome::Failed { reason })
                },
                Err(err) if err.is_fatal() => {
                    tracing::warn!(
                        reference = %item.reference,
                        attempts = item.attempts,
                        error = %err,
                        "Status lookup rejected"
                    );
                    None
                },
                Err(err) => {
                    tracing::debug!(
                        reference = %item.reference,
                        attempts = item.attempts,
                        error = %err,
                        "Status lookup failed"
                    );
                    None
                },
            };

            let exhausted = item.attempts >= self.config.max_attempts;
            let outcome = outcome.or_else(|| exhausted.then_some(ConfirmationOutcome::Abandoned));

            if let Some(outcome) = outcome {
                resolved.push((index, outcome));
            }
        }

        let count = resolved.len();
        let mut updates = Vec::with_capacity(count);
        for (index, outcome) in resolved.into_iter().rev() {
            let item = self.pending.remove(index);
            updates.push(ConfirmationUpdate {
                reference: item.reference,
                outcome,
                attempts: item.attempts,
            });
        }

        for update in updates.into_iter().rev() {
            self.publish(update).await;
        }

        count
    }

    /// Time until the earliest pending reference is due.
    ///
    /// Derived from the per-reference poll times, so new references arriving
    /// never push back a poll that is already scheduled.
    pub fn next_poll_in(&self) -> Duration {
        let now = self.env.now();
        self.pending
            .iter()
            .map(|item| self.config.poll_interval.saturating_sub(now - item.since))
            .min()
            .unwrap_or(self.config.poll_interval)
    }

    /// Drive the tracker until `shutdown` flips to true or its sender drops.
    ///
    /// New references arrive on `requests`; each pending reference is polled
    /// once its own interval has elapsed.
    pub async fn run(
        mut self,
        mut requests: mpsc::Receiver<TxReference>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let wait = self.next_poll_in();

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                Some(reference) = requests.recv() => {
                    self.track(reference);
                }

                () = self.env.sleep(wait) => {
                    self.poll_due().await;
                }
            }
        }

        tracing::debug!(pending = self.pending.len(), "Confirmation tracker stopped");
    }

    /// One status lookup, bounded by `lookup_timeout`.
    async fn lookup(&self, reference: &TxReference) -> Result<TransactionStatus, StatusError> {
        let timeout = self.config.lookup_timeout;

        tokio::select! {
            status = self.source.status(reference) => status,
            () = self.env.sleep(timeout) => {
                Err(StatusError::Unavailable(format!("no answer within {timeout:?}")))
            }
        }
    }

    async fn publish(&self, update: ConfirmationUpdate) {
        match &update.outcome {
            ConfirmationOutcome::Abandoned => tracing::warn!(
                reference = %update.reference,
                attempts = update.attempts,
                "Abandoned confirmation"
            ),
            outcome => tracing::info!(
                reference = %update.reference,
                attempts = update.attempts,
                ?outcome,
                "Confirmation resolved"
            ),
        }

        if self.updates.send(update).await.is_err() {
            tracing::debug!("Confirmation receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet, VecDeque},
        sync::{
            Arc, Mutex, PoisonError,
            atomic::{AtomicU64, Ordering},
        },
    };

    use super::*;

    /// Tokio's clock; tests run with it paused so time only moves when
    /// advanced or when every task is idle.
    #[derive(Clone)]
    struct TestEnv;

    impl TestEnv {
        async fn advance(&self, duration: Duration) {
            tokio::time::advance(duration).await;
        }
    }

    impl Environment for TestEnv {
        type Instant = tokio::time::Instant;

        fn now(&self) -> tokio::time::Instant {
            tokio::time::Instant::now()
        }

        fn wall_clock_secs(&self) -> u64 {
            0
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }
    }

    /// Replays scripted answers per reference; `Pending` once exhausted.
    #[derive(Clone, Default)]
    struct ScriptedSource {
        answers: Arc<Mutex<HashMap<String, VecDeque<Result<TransactionStatus, StatusError>>>>>,
        hanging: Arc<Mutex<HashSet<String>>>,
        calls: Arc<AtomicU64>,
    }

    impl ScriptedSource {
        fn script(&self, reference: &str, answers: Vec<Result<TransactionStatus, StatusError>>) {
            self.answers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(reference.to_string(), answers.into());
        }

        /// Make lookups of `reference` never answer.
        fn hang(&self, reference: &str) {
            self.hanging
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(reference.to_string());
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatusSource for ScriptedSource {
        async fn status(&self, reference: &TxReference) -> Result<TransactionStatus, StatusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let hangs = self
                .hanging
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(reference.as_str());
            if hangs {
                std::future::pending::<()>().await;
            }

            self.answers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_mut(reference.as_str())
                .and_then(VecDeque::pop_front)
                .unwrap_or(Ok(TransactionStatus::Pending))
        }
    }

    fn tracker(
        config: ConfirmationConfig,
    ) -> (
        ConfirmationTracker<ScriptedSource, TestEnv>,
        ScriptedSource,
        TestEnv,
        mpsc::Receiver<ConfirmationUpdate>,
    ) {
        let source = ScriptedSource::default();
        let env = TestEnv;
        let (tx, rx) = mpsc::channel(16);
        (ConfirmationTracker::new(source.clone(), env.clone(), config, tx), source, env, rx)
    }

    #[test]
    fn config_defaults() {
        let config = ConfirmationConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 60);
        assert_eq!(config.lookup_timeout, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_polled_before_the_interval() {
        let (mut tracker, source, env, _rx) = tracker(ConfirmationConfig::default());
        tracker.track(TxReference::new("tx-1"));

        env.advance(Duration::from_secs(4)).await;
        assert_eq!(tracker.poll_due().await, 0);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_is_published_once() {
        let (mut tracker, source, env, mut rx) = tracker(ConfirmationConfig::default());
        source.script(
            "tx-1",
            vec![Ok(TransactionStatus::Pending), Ok(TransactionStatus::Confirmed)],
        );
        tracker.track(TxReference::new("tx-1"));

        env.advance(DEFAULT_POLL_INTERVAL).await;
        assert_eq!(tracker.poll_due().await, 0);
        env.advance(DEFAULT_POLL_INTERVAL).await;
        assert_eq!(tracker.poll_due().await, 1);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.reference, TxReference::new("tx-1"));
        assert_eq!(update.outcome, ConfirmationOutcome::Confirmed);
        assert_eq!(update.attempts, 2);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ledger_rejection_is_reported() {
        let (mut tracker, source, env, mut rx) = tracker(ConfirmationConfig::default());
        source.script(
            "tx-1",
            vec![Ok(TransactionStatus::Failed { reason: "fee too low".to_string() })],
        );
        tracker.track(TxReference::new("tx-1"));

        env.advance(DEFAULT_POLL_INTERVAL).await;
        tracker.poll_due().await;

        let update = rx.recv().await.unwrap();
        assert_eq!(
            update.outcome,
            ConfirmationOutcome::Failed { reason: "fee too low".to_string() }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_after_max_attempts() {
        let config = ConfirmationConfig { max_attempts: 3, ..ConfirmationConfig::default() };
        let (mut tracker, source, env, mut rx) = tracker(config);
        tracker.track(TxReference::new("stuck"));

        for _ in 0..3 {
            env.advance(DEFAULT_POLL_INTERVAL).await;
            tracker.poll_due().await;
        }

        let update = rx.recv().await.unwrap();
        assert_eq!(update.outcome, ConfirmationOutcome::Abandoned);
        assert_eq!(update.attempts, 3);
        assert_eq!(source.calls(), 3);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_failure_does_not_affect_other_items() {
        let (mut tracker, source, env, mut rx) = tracker(ConfirmationConfig::default());
        source.script("bad", vec![Err(StatusError::Unavailable("timeout".to_string()))]);
        source.script("good", vec![Ok(TransactionStatus::Confirmed)]);
        tracker.track(TxReference::new("bad"));
        tracker.track(TxReference::new("good"));

        env.advance(DEFAULT_POLL_INTERVAL).await;
        assert_eq!(tracker.poll_due().await, 1);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.reference, TxReference::new("good"));
        assert_eq!(tracker.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn items_keep_their_own_schedule() {
        let (mut tracker, source, env, _rx) = tracker(ConfirmationConfig::default());
        tracker.track(TxReference::new("early"));
        env.advance(Duration::from_secs(3)).await;
        tracker.track(TxReference::new("late"));

        env.advance(Duration::from_secs(2)).await;
        tracker.poll_due().await;
        assert_eq!(source.calls(), 1);

        env.advance(Duration::from_secs(3)).await;
        tracker.poll_due().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_references_are_tracked_once() {
        let (mut tracker, _, _, _rx) = tracker(ConfirmationConfig::default());

        assert!(tracker.track(TxReference::new("tx-1")));
        assert!(!tracker.track(TxReference::new("tx-1")));
        assert_eq!(tracker.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_tracks_publishes_and_stops() {
        let (tracker, source, _, mut rx) = tracker(ConfirmationConfig::default());
        source.script("tx-1", vec![Ok(TransactionStatus::Confirmed)]);

        let (request_tx, request_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(tracker.run(request_rx, shutdown_rx));

        request_tx.send(TxReference::new("tx-1")).await.unwrap();
        let update = rx.recv().await.unwrap();
        assert_eq!(update.outcome, ConfirmationOutcome::Confirmed);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_lookup_does_not_block_other_references() {
        let (mut tracker, source, env, mut rx) = tracker(ConfirmationConfig::default());
        source.hang("stuck-a");
        source.hang("stuck-b");
        source.script("good", vec![Ok(TransactionStatus::Confirmed)]);
        tracker.track(TxReference::new("stuck-a"));
        tracker.track(TxReference::new("stuck-b"));
        tracker.track(TxReference::new("good"));

        env.advance(DEFAULT_POLL_INTERVAL).await;
        let started = tokio::time::Instant::now();
        assert_eq!(tracker.poll_due().await, 1);

        // Both timeouts ran side by side
        assert!(started.elapsed() < DEFAULT_LOOKUP_TIMEOUT * 2);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.reference, TxReference::new("good"));
        assert_eq!(update.outcome, ConfirmationOutcome::Confirmed);
        assert_eq!(source.calls(), 3);
        assert_eq!(tracker.pending_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_lookups_count_toward_abandonment() {
        let config = ConfirmationConfig { max_attempts: 2, ..ConfirmationConfig::default() };
        let (mut tracker, source, env, mut rx) = tracker(config);
        source.hang("stuck");
        tracker.track(TxReference::new("stuck"));

        for _ in 0..2 {
            env.advance(DEFAULT_POLL_INTERVAL).await;
            tracker.poll_due().await;
        }

        let update = rx.recv().await.unwrap();
        assert_eq!(update.outcome, ConfirmationOutcome::Abandoned);
        assert_eq!(update.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn next_poll_follows_the_earliest_reference() {
        let (mut tracker, _, env, _rx) = tracker(ConfirmationConfig::default());
        assert_eq!(tracker.next_poll_in(), DEFAULT_POLL_INTERVAL);

        tracker.track(TxReference::new("first"));
        env.advance(Duration::from_secs(2)).await;
        tracker.track(TxReference::new("second"));

        assert_eq!(tracker.next_poll_in(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn steady_request_stream_does_not_starve_polling() {
        let (tracker, source, _, mut rx) = tracker(ConfirmationConfig::default());
        source.script("tx-0", vec![Ok(TransactionStatus::Confirmed)]);

        let (request_tx, request_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(tracker.run(request_rx, shutdown_rx));

        // A new reference every second, faster than the poll interval
        for i in 0..60 {
            request_tx.send(TxReference::new(format!("tx-{i}"))).await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(source.calls() >= 10, "only {} status lookups", source.calls());
        let update = rx.try_recv().unwrap();
        assert_eq!(update.reference, TxReference::new("tx-0"));
        assert_eq!(update.outcome, ConfirmationOutcome::Confirmed);
    }
}
