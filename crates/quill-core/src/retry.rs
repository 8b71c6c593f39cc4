//! Retry executor with pluggable recovery.
//!
//! Every remote call in Quill goes through a [`RetryExecutor`], which runs
//! the operation under a [`RetryPolicy`] (bounded or unbounded attempts,
//! capped exponential backoff) and a [`RecoveryStrategy`] (an ordered list
//! of predicate→action pairs, typically "unauthorized → refresh token").
//!
//! Classification drives the loop:
//!
//! - **Permanent** errors propagate after a single attempt.
//! - **Unauthorized** errors run the first matching recovery action, then
//!   retry. A failed recovery propagates its own error.
//! - **Transient** errors sleep the attempt-indexed backoff, then retry.
//!
//! When a bounded attempt budget is spent, the last error is wrapped in
//! [`ClientError::RetriesExhausted`] so callers can distinguish "never
//! worked" from "stopped working".

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult, ErrorClass};

// =============================================================================
// Retry Policy
// =============================================================================

/// The attempt budget of a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAttempts {
    /// At most this many attempts. Must be at least 1.
    Bounded(u32),
    /// Retry forever. Used by the event-ingestion loop.
    Unbounded,
}

/// Backoff and attempt configuration for a [`RetryExecutor`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempts: RetryAttempts,
    base_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget.
    ///
    /// Defaults: 500ms base interval, 2.0 multiplier, 30s cap, no jitter.
    pub fn new(attempts: RetryAttempts) -> Self {
        if let RetryAttempts::Bounded(n) = attempts {
            assert!(n >= 1, "retry policy requires at least one attempt");
        }
        Self {
            attempts,
            base_interval: Duration::from_millis(500),
            multiplier: 2.0,
            max_interval: Duration::from_secs(30),
            jitter: false,
        }
    }

    /// Sets the base (first-retry) interval.
    pub fn base_interval(mut self, interval: Duration) -> Self {
        self.base_interval = interval;
        self
    }

    /// Sets the exponential multiplier applied per attempt.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the upper bound on any computed interval.
    pub fn max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Enables randomized jitter on computed intervals.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the attempt budget.
    pub fn attempts(&self) -> RetryAttempts {
        self.attempts
    }

    /// Returns true if `attempts_made` has reached a bounded budget.
    fn exhausted(&self, attempts_made: u32) -> bool {
        match self.attempts {
            RetryAttempts::Bounded(max) => attempts_made >= max,
            RetryAttempts::Unbounded => false,
        }
    }

    /// Computes the backoff interval before retry number `attempt`
    /// (1-indexed: the sleep after the first failure is attempt 1).
    ///
    /// The computed interval never exceeds the configured maximum. With
    /// jitter enabled, the result is drawn uniformly from the upper half
    /// of the computed interval.
    pub fn interval_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let scaled = self.base_interval.as_millis() as f64 * self.multiplier.powi(exp as i32);
        let capped = scaled.min(self.max_interval.as_millis() as f64).max(0.0) as u64;
        if self.jitter && capped > 1 {
            let low = capped / 2;
            Duration::from_millis(rand::thread_rng().gen_range(low..=capped))
        } else {
            Duration::from_millis(capped)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryAttempts::Bounded(10))
    }
}

// =============================================================================
// Recovery Strategy
// =============================================================================

/// Predicate deciding whether a recovery entry applies to an error.
pub type RecoveryPredicate = Arc<dyn Fn(&ClientError) -> bool + Send + Sync>;

/// A recovery action, typically a token refresh.
///
/// Actions must be safe to invoke repeatedly: concurrent operations hitting
/// unauthorized at the same time may each trigger the action.
pub type RecoveryAction = Arc<dyn Fn() -> BoxFuture<'static, ClientResult<()>> + Send + Sync>;

/// An ordered list of (predicate, action) pairs, evaluated first-match.
///
/// Deriving a variant (e.g. layering a delegated-session refresh on top of
/// a base strategy) copies the list and appends; a shared base is never
/// mutated in place.
#[derive(Clone, Default)]
pub struct RecoveryStrategy {
    entries: Vec<(RecoveryPredicate, RecoveryAction)>,
}

impl RecoveryStrategy {
    /// Creates an empty strategy (no error is recoverable).
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a recovery entry, returning the extended strategy.
    pub fn with<P, A>(mut self, predicate: P, action: A) -> Self
    where
        P: Fn(&ClientError) -> bool + Send + Sync + 'static,
        A: Fn() -> BoxFuture<'static, ClientResult<()>> + Send + Sync + 'static,
    {
        self.entries.push((Arc::new(predicate), Arc::new(action)));
        self
    }

    /// Convenience entry matching any unauthorized error.
    pub fn on_unauthorized<A>(self, action: A) -> Self
    where
        A: Fn() -> BoxFuture<'static, ClientResult<()>> + Send + Sync + 'static,
    {
        self.with(
            |err| matches!(err.class(), Some(ErrorClass::Unauthorized)),
            action,
        )
    }

    /// Returns the first action whose predicate matches `err`.
    fn find(&self, err: &ClientError) -> Option<&RecoveryAction> {
        self.entries
            .iter()
            .find(|(predicate, _)| predicate(err))
            .map(|(_, action)| action)
    }

    /// Returns the number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryStrategy")
            .field("entries", &self.entries.len())
            .finish()
    }
}

// =============================================================================
// Retry Executor
// =============================================================================

/// Runs operations with bounded retries, backoff and recovery.
///
/// Cloning is cheap; the policy is copied and the strategy shares its
/// entries.
#[derive(Clone, Debug)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    recovery: RecoveryStrategy,
}

impl RetryExecutor {
    /// Creates an executor from a policy and a recovery strategy.
    pub fn new(policy: RetryPolicy, recovery: RecoveryStrategy) -> Self {
        Self { policy, recovery }
    }

    /// Returns a copy of this executor with an extended recovery strategy.
    ///
    /// The receiver's strategy is left untouched.
    pub fn derive<P, A>(&self, predicate: P, action: A) -> Self
    where
        P: Fn(&ClientError) -> bool + Send + Sync + 'static,
        A: Fn() -> BoxFuture<'static, ClientResult<()>> + Send + Sync + 'static,
    {
        Self {
            policy: self.policy.clone(),
            recovery: self.recovery.clone().with(predicate, action),
        }
    }

    /// Returns the bound policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `operation` under the bound policy and recovery strategy.
    ///
    /// `name` identifies the operation and `target` the remote resource;
    /// both appear in log output only.
    pub async fn execute<T, F, Fut>(
        &self,
        name: &str,
        target: &str,
        mut operation: F,
    ) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ClientResult<T>>,
    {
        let started = Instant::now();
        let mut attempts_made: u32 = 0;

        loop {
            attempts_made += 1;
            let err = match operation().await {
                Ok(value) => {
                    debug!(
                        operation = name,
                        target,
                        attempt = attempts_made,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Operation succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => err,
            };

            match err.class() {
                Some(ErrorClass::Unauthorized) => {
                    let Some(action) = self.recovery.find(&err) else {
                        warn!(
                            operation = name,
                            target,
                            attempt = attempts_made,
                            error = %err,
                            "Unauthorized with no recovery strategy, giving up"
                        );
                        return Err(err);
                    };
                    debug!(
                        operation = name,
                        target,
                        attempt = attempts_made,
                        "Unauthorized, running recovery before retry"
                    );
                    // A failed recovery is not retried here; its error
                    // propagates directly to the caller.
                    action().await?;
                    // Recovery grants the retry that follows it, so the
                    // exhaustion check allows one attempt past the budget.
                    if self.policy.exhausted(attempts_made.saturating_sub(1)) {
                        return Err(ClientError::RetriesExhausted {
                            attempts: attempts_made,
                            last: Box::new(err),
                        });
                    }
                }
                Some(ErrorClass::Transient(kind)) => {
                    if self.policy.exhausted(attempts_made) {
                        warn!(
                            operation = name,
                            target,
                            attempts = attempts_made,
                            error = %err,
                            "Retry budget exhausted"
                        );
                        return Err(ClientError::RetriesExhausted {
                            attempts: attempts_made,
                            last: Box::new(err),
                        });
                    }
                    let interval = self.policy.interval_for(attempts_made);
                    debug!(
                        operation = name,
                        target,
                        attempt = attempts_made,
                        kind = %kind,
                        backoff_ms = interval.as_millis() as u64,
                        "Transient failure, backing off"
                    );
                    tokio::time::sleep(interval).await;
                }
                Some(ErrorClass::Permanent) | None => {
                    debug!(
                        operation = name,
                        target,
                        attempt = attempts_made,
                        error = %err,
                        "Non-retryable failure"
                    );
                    return Err(err);
                }
            }
        }
    }
}
