use std::collections::BTreeSet;
use std::time::Duration;

use super::backoff;
use super::classify::{self, StopReason, Verdict};
use super::failure::{FailureKind, FailureRecord};

/// Decision returned by the retry policy for one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop and hand the failure to recovery.
    Stop(StopReason),
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Invalid policy parameters, reported when the policy is built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(f64),
}

/// Exponential backoff policy with kind-based exclusions.
///
/// Immutable once built; share it behind an `Arc` across invocations.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Option<Duration>,
    non_retryable: BTreeSet<FailureKind>,
}

impl Default for RetryPolicy {
    /// Five attempts, 100ms initial delay doubling each time, no cap.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: None,
            non_retryable: BTreeSet::new(),
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Maximum number of attempts (including the first).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Upper bound on a single backoff wait, if any.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    pub fn non_retryable_kinds(&self) -> &BTreeSet<FailureKind> {
        &self.non_retryable
    }

    /// Backoff wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff::delay(attempt, self)
    }

    /// Every wait a fully exhausted run would take, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_for(a)).collect()
    }

    /// Decide what to do after `failure` ended attempt number `attempt` (1-based).
    pub fn decide(&self, attempt: u32, failure: &FailureRecord) -> RetryDecision {
        match classify::classify(failure, self, attempt) {
            Verdict::Retry => RetryDecision::RetryAfter(self.delay_for(attempt)),
            Verdict::Stop(reason) => RetryDecision::Stop(reason),
        }
    }
}

/// Builder for [`RetryPolicy`]; starts from the defaults.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.policy.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, d: Duration) -> Self {
        self.policy.initial_delay = d;
        self
    }

    pub fn multiplier(mut self, m: f64) -> Self {
        self.policy.multiplier = m;
        self
    }

    pub fn max_delay(mut self, d: Duration) -> Self {
        self.policy.max_delay = Some(d);
        self
    }

    /// Never retry failures of this kind (or failures caused by it).
    pub fn no_retry_for(mut self, kind: impl Into<FailureKind>) -> Self {
        self.policy.non_retryable.insert(kind.into());
        self
    }

    pub fn build(self) -> Result<RetryPolicy, PolicyError> {
        let p = self.policy;
        if p.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !p.multiplier.is_finite() || p.multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(p.multiplier));
        }
        Ok(p)
    }
}
