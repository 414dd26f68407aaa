//! Retry with recovery.
//!
//! This module holds the whole engine: failure classification, exponential
//! backoff, recovery-handler selection, and the executor that ties them
//! together. Each piece is usable on its own; `Retryable` is the entry point.

mod args;
mod backoff;
mod classify;
mod error;
mod failure;
mod observer;
mod policy;
mod recovery;
mod run;

pub use args::{ArgType, ArgValue, CallArgs};
pub use backoff::delay;
pub use classify::{classify, is_retryable, StopReason, Verdict};
pub use error::{RegistryError, RetryError};
pub use failure::{FailureKind, FailureRecord};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use policy::{PolicyError, RetryDecision, RetryPolicy, RetryPolicyBuilder};
pub use recovery::{RecoveryHandler, RecoveryRegistry, Selection};
pub use run::{AttemptContext, Retryable, RetryableBuilder};
