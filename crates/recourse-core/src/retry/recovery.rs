//! Recovery handlers and the registry that picks one for a terminal failure.
//!
//! Selection filters handlers by accepted failure kind, then by argument shape,
//! and breaks ties by specificity (longest shape). A tie at the top is an
//! error, never a guess.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::args::{ArgType, CallArgs};
use super::error::{RegistryError, RetryError};
use super::failure::{FailureKind, FailureRecord};

type NullaryFn<T> = dyn Fn() -> Result<T, FailureRecord> + Send + Sync;
type WithArgsFn<T> = dyn Fn(&FailureRecord, &CallArgs) -> Result<T, FailureRecord> + Send + Sync;

enum Invoke<T> {
    /// Empty shape: called with no arguments.
    Nullary(Arc<NullaryFn<T>>),
    /// Non-empty shape: called with the failure and the original arguments.
    WithArgs(Arc<WithArgsFn<T>>),
}

impl<T> Clone for Invoke<T> {
    fn clone(&self) -> Self {
        match self {
            Invoke::Nullary(f) => Invoke::Nullary(Arc::clone(f)),
            Invoke::WithArgs(f) => Invoke::WithArgs(Arc::clone(f)),
        }
    }
}

/// Fallback invoked when retries are exhausted or disallowed.
pub struct RecoveryHandler<T> {
    name: String,
    accepted: BTreeSet<FailureKind>,
    shape: Vec<ArgType>,
    invoke: Invoke<T>,
}

impl<T> Clone for RecoveryHandler<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            accepted: self.accepted.clone(),
            shape: self.shape.clone(),
            invoke: self.invoke.clone(),
        }
    }
}

impl<T> fmt::Debug for RecoveryHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryHandler")
            .field("name", &self.name)
            .field("accepted", &self.accepted)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl<T> RecoveryHandler<T> {
    /// Handler with an empty shape: matches any arguments and is called with none.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Result<T, FailureRecord> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            accepted: BTreeSet::new(),
            shape: Vec::new(),
            invoke: Invoke::Nullary(Arc::new(f)),
        }
    }

    /// Handler for calls whose argument types equal `shape` exactly.
    ///
    /// It receives the terminal failure and the original arguments. The shape
    /// must not be empty; registration rejects an empty one.
    pub fn with_shape<F>(name: impl Into<String>, shape: impl IntoIterator<Item = ArgType>, f: F) -> Self
    where
        F: Fn(&FailureRecord, &CallArgs) -> Result<T, FailureRecord> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            accepted: BTreeSet::new(),
            shape: shape.into_iter().collect(),
            invoke: Invoke::WithArgs(Arc::new(f)),
        }
    }

    /// Restrict the handler to failures of `kind` (or caused by it). May be
    /// called repeatedly; a handler with no accepted kinds takes any failure.
    pub fn accepts(mut self, kind: impl Into<FailureKind>) -> Self {
        self.accepted.insert(kind.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accepted_kinds(&self) -> &BTreeSet<FailureKind> {
        &self.accepted
    }

    pub fn parameter_shape(&self) -> &[ArgType] {
        &self.shape
    }

    /// Number of parameters matched against the call; higher is more specific.
    pub fn specificity(&self) -> usize {
        self.shape.len()
    }

    pub fn accepts_failure(&self, failure: &FailureRecord) -> bool {
        self.accepted.is_empty() || failure.kinds().any(|k| self.accepted.contains(k))
    }

    pub fn accepts_args(&self, args: &CallArgs) -> bool {
        self.shape.is_empty() || args.matches_shape(&self.shape)
    }

    fn invoke(&self, failure: &FailureRecord, args: &CallArgs) -> Result<T, FailureRecord> {
        match &self.invoke {
            Invoke::Nullary(f) => f(),
            Invoke::WithArgs(f) => f(failure, args),
        }
    }

    /// Whether some failure could reach both handlers with the same specificity.
    fn always_ties_with(&self, other: &RecoveryHandler<T>) -> bool {
        self.shape == other.shape
            && (self.accepted.is_empty()
                || other.accepted.is_empty()
                || !self.accepted.is_disjoint(&other.accepted))
    }
}

/// Result of matching a failure and call against the registry.
#[derive(Debug)]
pub enum Selection<'a, T> {
    Selected(&'a RecoveryHandler<T>),
    NoMatch,
    /// Names of the equally specific handlers, in registration order.
    Ambiguous(Vec<String>),
}

/// Ordered set of recovery handlers for one wrapped operation.
///
/// Read-only after setup; selection never mutates it.
pub struct RecoveryRegistry<T> {
    handlers: Vec<RecoveryHandler<T>>,
}

impl<T> Default for RecoveryRegistry<T> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<T> Clone for RecoveryRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<T> fmt::Debug for RecoveryRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.handlers).finish()
    }
}

impl<T> RecoveryRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. Names must be unique; `with_shape` handlers need a non-empty shape.
    pub fn register(&mut self, handler: RecoveryHandler<T>) -> Result<(), RegistryError> {
        if self.get(handler.name()).is_some() {
            return Err(RegistryError::DuplicateHandler(handler.name));
        }
        if matches!(handler.invoke, Invoke::WithArgs(_)) && handler.shape.is_empty() {
            return Err(RegistryError::EmptyShape(handler.name));
        }
        self.handlers.push(handler);
        Ok(())
    }

    pub fn handlers(&self) -> &[RecoveryHandler<T>] {
        &self.handlers
    }

    pub fn get(&self, name: &str) -> Option<&RecoveryHandler<T>> {
        self.handlers.iter().find(|h| h.name == name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Report the first pair of handlers that would tie for some failure.
    ///
    /// Optional setup check; `dispatch` reports the same defect lazily as
    /// `AmbiguousRecoveryMatch` when such a call actually happens.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for (i, first) in self.handlers.iter().enumerate() {
            for second in &self.handlers[i + 1..] {
                if first.always_ties_with(second) {
                    return Err(RegistryError::AlwaysTied {
                        first: first.name.clone(),
                        second: second.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Pick the handler for `failure` raised by a call with `args`.
    ///
    /// With `pinned`, only the handler of that name is a candidate; the kind and
    /// shape filters still apply to it.
    pub fn select(
        &self,
        failure: &FailureRecord,
        args: &CallArgs,
        pinned: Option<&str>,
    ) -> Selection<'_, T> {
        let candidates: Vec<&RecoveryHandler<T>> = self
            .handlers
            .iter()
            .filter(|h| pinned.map_or(true, |name| h.name == name))
            .filter(|h| h.accepts_failure(failure))
            .filter(|h| h.accepts_args(args))
            .collect();

        let Some(best) = candidates.iter().map(|h| h.specificity()).max() else {
            return Selection::NoMatch;
        };
        let top: Vec<&RecoveryHandler<T>> = candidates
            .into_iter()
            .filter(|h| h.specificity() == best)
            .collect();
        match top.as_slice() {
            [only] => Selection::Selected(*only),
            _ => Selection::Ambiguous(top.iter().map(|h| h.name.clone()).collect()),
        }
    }

    /// Select a handler and run it. The handler's own failure is returned
    /// unchanged inside `RecoveryHandlerFailure`; it is never recovered again.
    pub fn dispatch(
        &self,
        failure: FailureRecord,
        args: &CallArgs,
        pinned: Option<&str>,
    ) -> Result<T, RetryError> {
        match self.select(&failure, args, pinned) {
            Selection::Selected(handler) => {
                handler
                    .invoke(&failure, args)
                    .map_err(|f| RetryError::RecoveryHandlerFailure {
                        handler: handler.name.clone(),
                        failure: f,
                    })
            }
            Selection::NoMatch => Err(RetryError::NoRecoveryMatch { failure }),
            Selection::Ambiguous(candidates) => Err(RetryError::AmbiguousRecoveryMatch {
                failure,
                candidates,
            }),
        }
    }
}
