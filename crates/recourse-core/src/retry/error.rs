//! Terminal outcomes of an invocation, and setup-time registry errors.

use super::failure::FailureRecord;

/// Why `run()` did not produce a value.
///
/// Retryable failures with attempts remaining never surface here; every
/// variant is terminal for its invocation.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// The operation's own terminal failure. Only returned in retry-only mode,
    /// where recovery is not consulted.
    #[error("operation failed after {attempts} attempt(s): {failure}")]
    OperationFailure {
        attempts: u32,
        #[source]
        failure: FailureRecord,
    },

    /// No registered handler accepts the terminal failure and call shape.
    #[error("no recovery handler matches {}", .failure.kind())]
    NoRecoveryMatch {
        #[source]
        failure: FailureRecord,
    },

    /// More than one handler matches with equal specificity.
    #[error(
        "ambiguous recovery for {}: handlers {} match equally",
        .failure.kind(),
        .candidates.join(", ")
    )]
    AmbiguousRecoveryMatch {
        #[source]
        failure: FailureRecord,
        candidates: Vec<String>,
    },

    /// The selected handler failed itself; its failure is carried unchanged.
    #[error("recovery handler {handler} failed: {failure}")]
    RecoveryHandlerFailure {
        handler: String,
        #[source]
        failure: FailureRecord,
    },

    /// Cancelled while waiting between attempts.
    #[error("cancelled during backoff after {attempts} attempt(s)")]
    Cancelled {
        attempts: u32,
        #[source]
        last_failure: FailureRecord,
    },
}

impl RetryError {
    /// The operation failure that led here, if any.
    ///
    /// For `RecoveryHandlerFailure` this is the handler's failure.
    pub fn failure(&self) -> &FailureRecord {
        match self {
            RetryError::OperationFailure { failure, .. }
            | RetryError::NoRecoveryMatch { failure }
            | RetryError::AmbiguousRecoveryMatch { failure, .. }
            | RetryError::RecoveryHandlerFailure { failure, .. } => failure,
            RetryError::Cancelled { last_failure, .. } => last_failure,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// True for `NoRecoveryMatch` and `AmbiguousRecoveryMatch`.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            RetryError::NoRecoveryMatch { .. } | RetryError::AmbiguousRecoveryMatch { .. }
        )
    }
}

/// Registry configuration defects found at setup time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("recovery handler {0} registered twice")]
    DuplicateHandler(String),

    /// Two handlers with the same shape and overlapping kinds; every call that
    /// reaches both would be ambiguous.
    #[error("recovery handlers {first} and {second} always tie (same shape, overlapping kinds)")]
    AlwaysTied { first: String, second: String },

    #[error("recovery handler {0} declares an empty parameter shape")]
    EmptyShape(String),

    #[error("pinned recovery handler {0} is not registered")]
    UnknownPinnedHandler(String),

    #[error("operation {0} registered twice")]
    DuplicateOperation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn no_match_carries_original_failure_as_source() {
        let err = RetryError::NoRecoveryMatch {
            failure: FailureRecord::new("Timeout", "slow"),
        };
        assert!(err.is_resolution_error());
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "Timeout: slow");
        assert_eq!(err.to_string(), "no recovery handler matches Timeout");
    }

    #[test]
    fn ambiguous_lists_candidates() {
        let err = RetryError::AmbiguousRecoveryMatch {
            failure: FailureRecord::new("Timeout", "slow"),
            candidates: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "ambiguous recovery for Timeout: handlers a, b match equally"
        );
    }

    #[test]
    fn cancelled_exposes_last_failure() {
        let err = RetryError::Cancelled {
            attempts: 2,
            last_failure: FailureRecord::new("Timeout", "slow"),
        };
        assert!(err.is_cancelled());
        assert!(!err.is_resolution_error());
        assert_eq!(err.failure().kind().as_str(), "Timeout");
    }
}
