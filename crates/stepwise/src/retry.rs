//! Bounded polling with fixed or exponential backoff.
//!
//! DOM state changes asynchronously relative to the commands that observe it,
//! so every query, actionability check and assertion runs inside a retry loop
//! that re-polls until it is satisfied, the budget is spent, or the owning
//! chain is aborted.
//!
//! Waiting between polls is a `tokio::time::sleep`, i.e. a cooperative yield.
//! The last sleep is clamped to the remaining budget: a predicate that never
//! succeeds fails no earlier than `timeout` and no later than `timeout` plus
//! one interval.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Default budget per command (4 seconds)
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 4000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Serde helpers for durations written as integer milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// How the pause between polls evolves
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same interval every time
    #[default]
    Fixed,
    /// Interval multiplied by `factor` after each poll, capped at `max_interval`
    Exponential {
        /// Growth factor, at least 1.0
        factor: f64,
        /// Upper bound for a single pause
        #[serde(rename = "max_interval_ms", with = "duration_ms")]
        max_interval: Duration,
    },
}

impl Backoff {
    /// Doubling backoff capped at one second
    #[must_use]
    pub const fn exponential() -> Self {
        Self::Exponential {
            factor: 2.0,
            max_interval: Duration::from_secs(1),
        }
    }
}

/// Timeout, interval and backoff of one retry loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total budget
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    /// Base pause between polls
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,
    /// Pause growth
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Create a fixed-interval policy
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    /// Create a policy from millisecond values
    #[must_use]
    pub const fn from_millis(timeout_ms: u64, interval_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(interval_ms),
        )
    }

    /// Set the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the base interval
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the backoff
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Pause after poll number `attempt` (1-based), before clamping
    #[must_use]
    pub fn interval_for(&self, attempt: u32) -> Duration {
        let base = self.interval.max(MIN_INTERVAL);
        match self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential {
                factor,
                max_interval,
            } => {
                let cap = max_interval.max(base);
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let secs = base.as_secs_f64() * factor.max(1.0).powi(exponent);
                if secs.is_finite() && secs < cap.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    cap
                }
            }
        }
    }

    /// Timeout in whole milliseconds
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Chain-wide cancellation flag
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    /// Create a cleared flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the chain as failed; no further loop starts or continues
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag is set
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// Predicate satisfied
    Ready(T),
    /// Not yet; carries the observed state
    Pending(String),
}

/// Successful loop result
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    /// Value returned by the satisfying poll
    pub value: T,
    /// Polls performed, including the satisfying one
    pub attempts: u32,
    /// Time from loop start to success
    pub elapsed: Duration,
}

/// Why a loop stopped without success
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    /// Budget exhausted
    #[error("timed out after {}ms ({attempts} attempt(s)); last observed: {last_observed}", elapsed.as_millis())]
    Timeout {
        /// Time spent
        elapsed: Duration,
        /// Polls performed
        attempts: u32,
        /// State seen by the final poll
        last_observed: String,
    },
    /// The owning chain was aborted
    #[error("aborted after {attempts} attempt(s)")]
    Aborted {
        /// Polls performed before the abort was noticed
        attempts: u32,
    },
}

/// Explicit suspend/resume form of the scheduler.
///
/// The caller polls, and on an unsatisfying result calls [`RetryLoop::wait`],
/// which either yields until the next poll is due or reports why no further
/// poll may happen.
#[derive(Debug)]
pub struct RetryLoop {
    policy: RetryPolicy,
    abort: AbortFlag,
    started: Instant,
    attempts: u32,
}

impl RetryLoop {
    /// Start a loop now.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Aborted`] if the chain is already aborted.
    pub fn start(policy: RetryPolicy, abort: &AbortFlag) -> Result<Self, RetryError> {
        if abort.is_aborted() {
            return Err(RetryError::Aborted { attempts: 0 });
        }
        Ok(Self {
            policy,
            abort: abort.clone(),
            started: Instant::now(),
            attempts: 0,
        })
    }

    /// Record an unsatisfying poll and wait for the next one.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Timeout`] once the budget is spent, or
    /// [`RetryError::Aborted`] if the chain was aborted.
    pub async fn wait(&mut self, observed: impl Into<String>) -> Result<(), RetryError> {
        self.attempts += 1;
        let observed = observed.into();
        if self.abort.is_aborted() {
            return Err(RetryError::Aborted {
                attempts: self.attempts,
            });
        }
        let elapsed = self.started.elapsed();
        if elapsed >= self.policy.timeout {
            tracing::debug!(
                attempts = self.attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                observed = %observed,
                "retry budget exhausted"
            );
            return Err(RetryError::Timeout {
                elapsed,
                attempts: self.attempts,
                last_observed: observed,
            });
        }
        let pause = self
            .policy
            .interval_for(self.attempts)
            .min(self.policy.timeout - elapsed);
        tracing::debug!(
            attempt = self.attempts,
            pause_ms = pause.as_millis() as u64,
            observed = %observed,
            "poll not satisfied"
        );
        tokio::time::sleep(pause).await;
        if self.abort.is_aborted() {
            return Err(RetryError::Aborted {
                attempts: self.attempts,
            });
        }
        Ok(())
    }

    /// Finish the loop with the satisfying value
    #[must_use]
    pub fn finish<T>(self, value: T) -> RetryOutcome<T> {
        RetryOutcome {
            value,
            attempts: self.attempts + 1,
            elapsed: self.started.elapsed(),
        }
    }

    /// Polls recorded so far
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Time since the loop started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Policy of this loop
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

/// Poll `predicate` until it is ready, the budget is spent or `abort` is set.
///
/// # Errors
///
/// Returns [`RetryError::Timeout`] with the last observed state, or
/// [`RetryError::Aborted`].
pub async fn retry<T, F>(
    policy: RetryPolicy,
    abort: &AbortFlag,
    mut predicate: F,
) -> Result<RetryOutcome<T>, RetryError>
where
    F: FnMut() -> Attempt<T>,
{
    let mut looper = RetryLoop::start(policy, abort)?;
    loop {
        match predicate() {
            Attempt::Ready(value) => return Ok(looper.finish(value)),
            Attempt::Pending(observed) => looper.wait(observed).await?,
        }
    }
}
