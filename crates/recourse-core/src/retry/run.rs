//! Retry loop: run an operation until success, then recover on a terminal failure.
//!
//! State machine per invocation:
//! `Attempting -> Succeeded` returns the value; `Attempting -> AwaitingBackoff ->
//! Attempting` on a retryable failure; `Attempting -> Recovering` once the
//! policy says stop, after which the registry's result is the final outcome.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;

use super::args::CallArgs;
use super::classify::StopReason;
use super::error::{RegistryError, RetryError};
use super::failure::FailureRecord;
use super::observer::{NoOpObserver, RetryObserver};
use super::policy::{RetryDecision, RetryPolicy};
use super::recovery::{RecoveryHandler, RecoveryRegistry};

/// Per-invocation state. Owned by exactly one in-flight invocation.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    attempt: u32,
    last_failure: Option<FailureRecord>,
    original_args: CallArgs,
}

impl AttemptContext {
    pub fn new(original_args: CallArgs) -> Self {
        Self {
            attempt: 1,
            last_failure: None,
            original_args,
        }
    }

    /// Current attempt number, 1-based.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Failure of the previous attempt, if any attempt has failed and been retried.
    pub fn last_failure(&self) -> Option<&FailureRecord> {
        self.last_failure.as_ref()
    }

    pub fn original_args(&self) -> &CallArgs {
        &self.original_args
    }

    /// Record a retried failure and move to the next attempt.
    pub fn advance(&mut self, failure: FailureRecord) {
        self.last_failure = Some(failure);
        self.attempt = self.attempt.saturating_add(1);
    }
}

/// A wrapped operation: a named policy plus its recovery handlers.
///
/// Immutable and cheap to clone; concurrent `run` calls share nothing mutable.
pub struct Retryable<T> {
    name: Arc<str>,
    policy: Arc<RetryPolicy>,
    registry: Arc<RecoveryRegistry<T>>,
    pinned: Option<Arc<str>>,
    observer: Arc<dyn RetryObserver>,
}

impl<T> Clone for Retryable<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            policy: Arc::clone(&self.policy),
            registry: Arc::clone(&self.registry),
            pinned: self.pinned.clone(),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<T> fmt::Debug for Retryable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retryable")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("registry", &self.registry)
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}

impl<T> Retryable<T> {
    pub fn builder(name: impl Into<String>) -> RetryableBuilder<T> {
        RetryableBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &RecoveryRegistry<T> {
        &self.registry
    }

    /// Name of the handler recovery is restricted to, if pinned.
    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    /// Run `op` with `args` under the policy; recover on a terminal failure.
    ///
    /// `op` receives its own copy of the arguments on every attempt.
    pub async fn run<F, Fut>(&self, args: CallArgs, op: F) -> Result<T, RetryError>
    where
        F: FnMut(CallArgs) -> Fut,
        Fut: Future<Output = Result<T, FailureRecord>>,
    {
        self.execute(args, op, None, true).await
    }

    /// Like [`run`](Self::run), but a cancel during a backoff wait ends the
    /// invocation with `RetryError::Cancelled`; no further attempt, no recovery.
    pub async fn run_cancellable<F, Fut>(
        &self,
        args: CallArgs,
        op: F,
        cancel: &CancelToken,
    ) -> Result<T, RetryError>
    where
        F: FnMut(CallArgs) -> Fut,
        Fut: Future<Output = Result<T, FailureRecord>>,
    {
        self.execute(args, op, Some(cancel), true).await
    }

    /// Retry only: the terminal failure is returned as `OperationFailure`
    /// instead of being dispatched to a recovery handler.
    pub async fn run_without_recovery<F, Fut>(&self, args: CallArgs, op: F) -> Result<T, RetryError>
    where
        F: FnMut(CallArgs) -> Fut,
        Fut: Future<Output = Result<T, FailureRecord>>,
    {
        self.execute(args, op, None, false).await
    }

    /// Blocking variant for synchronous callers; backoff parks the current thread.
    /// Not cancellable.
    pub fn run_blocking<F>(&self, args: CallArgs, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut(&CallArgs) -> Result<T, FailureRecord>,
    {
        let start = Instant::now();
        let mut ctx = AttemptContext::new(args);
        loop {
            self.observer
                .on_attempt_start(&self.name, ctx.attempt, self.policy.max_attempts());
            let failure = match op(&ctx.original_args) {
                Ok(value) => {
                    self.observer.on_success(&self.name, ctx.attempt, start.elapsed());
                    return Ok(value);
                }
                Err(failure) => failure,
            };
            match self.policy.decide(ctx.attempt, &failure) {
                RetryDecision::RetryAfter(delay) => {
                    self.observer
                        .on_retry_scheduled(&self.name, ctx.attempt, &failure, delay);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    ctx.advance(failure);
                }
                RetryDecision::Stop(reason) => return self.conclude(ctx, failure, reason, true),
            }
        }
    }

    async fn execute<F, Fut>(
        &self,
        args: CallArgs,
        mut op: F,
        cancel: Option<&CancelToken>,
        recover: bool,
    ) -> Result<T, RetryError>
    where
        F: FnMut(CallArgs) -> Fut,
        Fut: Future<Output = Result<T, FailureRecord>>,
    {
        let start = Instant::now();
        let mut ctx = AttemptContext::new(args);
        loop {
            self.observer
                .on_attempt_start(&self.name, ctx.attempt, self.policy.max_attempts());
            let failure = match op(ctx.original_args.clone()).await {
                Ok(value) => {
                    self.observer.on_success(&self.name, ctx.attempt, start.elapsed());
                    return Ok(value);
                }
                Err(failure) => failure,
            };
            match self.policy.decide(ctx.attempt, &failure) {
                RetryDecision::RetryAfter(delay) => {
                    self.observer
                        .on_retry_scheduled(&self.name, ctx.attempt, &failure, delay);
                    if !backoff(delay, cancel).await {
                        self.observer.on_cancelled(&self.name, ctx.attempt);
                        return Err(RetryError::Cancelled {
                            attempts: ctx.attempt,
                            last_failure: failure,
                        });
                    }
                    ctx.advance(failure);
                }
                RetryDecision::Stop(reason) => {
                    return self.conclude(ctx, failure, reason, recover);
                }
            }
        }
    }

    fn conclude(
        &self,
        ctx: AttemptContext,
        failure: FailureRecord,
        reason: StopReason,
        recover: bool,
    ) -> Result<T, RetryError> {
        if !recover {
            return Err(RetryError::OperationFailure {
                attempts: ctx.attempt,
                failure,
            });
        }
        self.observer
            .on_recovery(&self.name, ctx.attempt, &reason, &failure);
        self.registry
            .dispatch(failure, &ctx.original_args, self.pinned.as_deref())
    }
}

/// Suspend for `delay`. Returns false if `cancel` fired first (or already had).
async fn backoff(delay: Duration, cancel: Option<&CancelToken>) -> bool {
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            }
        }
        None => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            true
        }
    }
}

/// Builder for [`Retryable`]: policy, ordered handlers, optional pin and observer.
pub struct RetryableBuilder<T> {
    name: String,
    policy: RetryPolicy,
    handlers: Vec<RecoveryHandler<T>>,
    pinned: Option<String>,
    observer: Arc<dyn RetryObserver>,
}

impl<T> RetryableBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: RetryPolicy::default(),
            handlers: Vec::new(),
            pinned: None,
            observer: Arc::new(NoOpObserver),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a recovery handler; registration order is kept.
    pub fn recover(mut self, handler: RecoveryHandler<T>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Restrict recovery to the handler with this name.
    pub fn recover_with(mut self, handler_name: impl Into<String>) -> Self {
        self.pinned = Some(handler_name.into());
        self
    }

    pub fn observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub(crate) fn shared_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> Result<Retryable<T>, RegistryError> {
        let mut registry = RecoveryRegistry::new();
        for handler in self.handlers {
            registry.register(handler)?;
        }
        if let Some(pinned) = &self.pinned {
            if registry.get(pinned).is_none() {
                return Err(RegistryError::UnknownPinnedHandler(pinned.clone()));
            }
        }
        Ok(Retryable {
            name: Arc::from(self.name),
            policy: Arc::new(self.policy),
            registry: Arc::new(registry),
            pinned: self.pinned.map(Arc::from),
            observer: self.observer,
        })
    }
}
