//! Classify a failed attempt: retry, or stop and why.

use super::failure::{FailureKind, FailureRecord};
use super::policy::RetryPolicy;

/// Why the executor stops retrying and moves to recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The attempt limit was reached.
    Exhausted,
    /// The failure (or one of its causes) has this excluded kind.
    NonRetryable(FailureKind),
}

/// Outcome of classifying one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Retry,
    Stop(StopReason),
}

/// Classify `failure`, which ended attempt number `attempt` (1-based).
///
/// Exhaustion is checked first, then the failure's kind and cause chain against
/// the policy's exclusions. Kinds the policy does not mention are retryable.
pub fn classify(failure: &FailureRecord, policy: &RetryPolicy, attempt: u32) -> Verdict {
    if attempt >= policy.max_attempts() {
        return Verdict::Stop(StopReason::Exhausted);
    }
    let excluded = policy.non_retryable_kinds();
    if let Some(kind) = failure.kinds().find(|k| excluded.contains(*k)) {
        return Verdict::Stop(StopReason::NonRetryable(kind.clone()));
    }
    Verdict::Retry
}

/// Whether another attempt is allowed after `failure` ended attempt `attempt`.
pub fn is_retryable(failure: &FailureRecord, policy: &RetryPolicy, attempt: u32) -> bool {
    matches!(classify(failure, policy, attempt), Verdict::Retry)
}
