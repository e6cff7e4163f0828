//! Retry policy and per-call retry state machine.
//!
//! [`RetryPolicy`] is pure: it maps an attempt number to a backoff delay and
//! decides whether a failure is worth another attempt. [`RetryState`] tracks
//! one in-flight submission through the phases
//!
//! ```text
//! Idle -> Attempting -> Succeeded
//!              |
//!              +-> FailedTransient -> Waiting -> Attempting ...
//!              |                  \-> FailedFatal (attempts exhausted)
//!              +-> FailedFatal (non-retryable error)
//! ```
//!
//! `FailedTransient` is never observable between calls: [`RetryState::fail`]
//! resolves it into `Waiting` or `FailedFatal` before returning.

use std::time::{Duration, Instant};

use rand::RngExt;
use vetro_config::RetryConfig;

use crate::error::SubmitError;

/// Exponential backoff with a bounded number of attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Growth factor per further failed attempt.
    pub multiplier: f64,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
    /// Random extra delay as a fraction of the computed delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier.max(1.0),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `base_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    /// Non-decreasing in `attempt`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let nanos = self.base_delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos.round() as u64)
    }

    /// Whether to try again after failed attempt number `attempt` (1-based).
    ///
    /// Always false once `attempt` reaches `max_attempts`.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &SubmitError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Apply random jitter to a delay, still capped at `max_delay`.
    #[must_use]
    pub fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let extra = delay.mul_f64(self.jitter * rand::rng().random::<f64>());
        (delay + extra).min(self.max_delay.max(delay))
    }
}

/// Phase of a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// Not yet submitted.
    Idle,
    /// Request in flight.
    Attempting,
    /// Backing off before the next attempt.
    Waiting,
    /// Completed with a 2xx response.
    Succeeded,
    /// Retryable failure, about to be resolved.
    FailedTransient,
    /// Gave up: non-retryable error or attempts exhausted.
    FailedFatal,
}

/// Retry bookkeeping for one submission. Dropped when the call resolves.
#[derive(Debug)]
pub struct RetryState<'p> {
    policy: &'p RetryPolicy,
    phase: RetryPhase,
    attempts: u32,
    last_delay: Option<Duration>,
    next_eligible: Option<Instant>,
}

impl<'p> RetryState<'p> {
    /// Start in `Idle`.
    #[must_use]
    pub fn new(policy: &'p RetryPolicy) -> Self {
        Self {
            policy,
            phase: RetryPhase::Idle,
            attempts: 0,
            last_delay: None,
            next_eligible: None,
        }
    }

    /// Move from `Idle` or `Waiting` to `Attempting`; returns the attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        debug_assert!(
            matches!(self.phase, RetryPhase::Idle | RetryPhase::Waiting),
            "begin_attempt from {:?}",
            self.phase
        );
        self.phase = RetryPhase::Attempting;
        self.next_eligible = None;
        self.attempts += 1;
        self.attempts
    }

    /// Record a successful attempt.
    pub fn succeed(&mut self) {
        debug_assert_eq!(self.phase, RetryPhase::Attempting);
        self.phase = RetryPhase::Succeeded;
    }

    /// Record a failed attempt.
    ///
    /// Returns the delay to wait before the next attempt (phase `Waiting`),
    /// or `None` when the submission has permanently failed (`FailedFatal`).
    pub fn fail(&mut self, error: &SubmitError) -> Option<Duration> {
        debug_assert_eq!(self.phase, RetryPhase::Attempting);
        if !error.is_retryable() {
            self.phase = RetryPhase::FailedFatal;
            return None;
        }

        self.phase = RetryPhase::FailedTransient;
        if !self.policy.should_retry(self.attempts, error) {
            self.phase = RetryPhase::FailedFatal;
            return None;
        }

        let delay = self.policy.jittered(self.policy.next_delay(self.attempts));
        self.phase = RetryPhase::Waiting;
        self.last_delay = Some(delay);
        self.next_eligible = Some(Instant::now() + delay);
        Some(delay)
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// Attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay chosen after the most recent retryable failure.
    #[must_use]
    pub fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }

    /// Earliest time the next attempt may start, while `Waiting`.
    #[must_use]
    pub fn next_eligible(&self) -> Option<Instant> {
        self.next_eligible
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(500),
            jitter: 0.0,
        }
    }

    fn server_error() -> SubmitError {
        SubmitError::from_status(503, String::new()).unwrap()
    }

    #[test]
    fn test_default_matches_config_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 6);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_exponential_delays_capped() {
        let p = policy();
        assert_eq!(p.next_delay(1), Duration::from_millis(100));
        assert_eq!(p.next_delay(2), Duration::from_millis(200));
        assert_eq!(p.next_delay(3), Duration::from_millis(400));
        assert_eq!(p.next_delay(4), Duration::from_millis(500));
        assert_eq!(p.next_delay(u32::MAX), Duration::from_millis(500));
    }

    #[test]
    fn test_delays_non_decreasing() {
        let p = RetryPolicy {
            multiplier: 1.7,
            max_delay: Duration::from_secs(30),
            ..policy()
        };
        let delays: Vec<_> = (1..=40).map(|a| p.next_delay(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]), "{delays:?}");
        assert_eq!(delays.last().copied(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_should_retry_bounded() {
        let p = policy();
        let err = server_error();
        assert!(p.should_retry(1, &err));
        assert!(p.should_retry(3, &err));
        for attempt in [4, 5, 100, u32::MAX] {
            assert!(!p.should_retry(attempt, &err), "{attempt}");
        }
    }

    #[test]
    fn test_should_not_retry_fatal_errors() {
        let p = policy();
        let auth = SubmitError::from_status(401, String::new()).unwrap();
        let bad = SubmitError::from_status(400, String::new()).unwrap();
        assert!(!p.should_retry(1, &auth));
        assert!(!p.should_retry(1, &bad));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let p = RetryPolicy {
            jitter: 0.5,
            max_delay: Duration::from_secs(10),
            ..policy()
        };
        for _ in 0..50 {
            let d = p.jittered(Duration::from_millis(100));
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150), "{d:?}");
        }
        assert_eq!(policy().jittered(Duration::from_millis(100)), Duration::from_millis(100));
    }

    #[test]
    fn test_state_machine_success_after_retry() {
        let p = policy();
        let mut state = RetryState::new(&p);
        assert_eq!(state.phase(), RetryPhase::Idle);

        assert_eq!(state.begin_attempt(), 1);
        assert_eq!(state.phase(), RetryPhase::Attempting);

        let delay = state.fail(&server_error());
        assert_eq!(delay, Some(Duration::from_millis(100)));
        assert_eq!(state.phase(), RetryPhase::Waiting);
        assert!(state.next_eligible().is_some());

        assert_eq!(state.begin_attempt(), 2);
        state.succeed();
        assert_eq!(state.phase(), RetryPhase::Succeeded);
        assert_eq!(state.attempts(), 2);
        assert_eq!(state.last_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_state_machine_exhausts_attempts() {
        let p = policy();
        let mut state = RetryState::new(&p);
        let mut waits = 0;
        loop {
            state.begin_attempt();
            match state.fail(&server_error()) {
                Some(_) => waits += 1,
                None => break,
            }
        }
        assert_eq!(state.phase(), RetryPhase::FailedFatal);
        assert_eq!(state.attempts(), 4);
        assert_eq!(waits, 3);
    }

    #[test]
    fn test_state_machine_fatal_error_stops_immediately() {
        let p = policy();
        let mut state = RetryState::new(&p);
        state.begin_attempt();
        let err = SubmitError::from_status(422, "bad value".to_owned()).unwrap();
        assert_eq!(state.fail(&err), None);
        assert_eq!(state.phase(), RetryPhase::FailedFatal);
        assert_eq!(state.attempts(), 1);
        assert_eq!(state.last_delay(), None);
    }
}
