//! Retry-with-recovery execution engine.
//!
//! Wrap a fallible operation in a [`retry::Retryable`]: it is re-invoked under a
//! [`retry::RetryPolicy`] (attempt limit, exponential backoff, non-retryable
//! kinds) and, once retries stop, a recovery handler is chosen by failure kind
//! and call-argument shape.

pub mod cancel;
pub mod config;
pub mod engine;
pub mod logging;
pub mod retry;
