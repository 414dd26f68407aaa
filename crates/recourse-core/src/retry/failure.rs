//! Failure records produced by the wrapped operation.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Classification tag identifying the category of a failure (e.g. `Timeout`).
///
/// Kinds are opaque names; the engine only compares them for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureKind(String);

impl FailureKind {
    pub fn new(name: impl Into<String>) -> Self {
        FailureKind(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FailureKind {
    fn from(name: &str) -> Self {
        FailureKind(name.to_string())
    }
}

impl From<String> for FailureKind {
    fn from(name: String) -> Self {
        FailureKind(name)
    }
}

impl Borrow<str> for FailureKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One failed attempt: its kind, a message, and the kinds it wraps.
///
/// `cause_chain` lists the kinds of the failures this one wraps, nearest first.
/// Classification and recovery matching look at the whole chain, so a
/// `Wrapped` failure caused by `IllegalArgument` is treated as both.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FailureRecord {
    kind: FailureKind,
    message: String,
    cause_chain: Vec<FailureKind>,
}

impl FailureRecord {
    pub fn new(kind: impl Into<FailureKind>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            cause_chain: Vec::new(),
        }
    }

    /// Append a kind to the end of the cause chain.
    pub fn caused_by(mut self, kind: impl Into<FailureKind>) -> Self {
        self.cause_chain.push(kind.into());
        self
    }

    /// Wrap this failure in a new one; the current kind and chain become the new chain.
    pub fn wrap(self, kind: impl Into<FailureKind>, message: impl Into<String>) -> Self {
        let mut cause_chain = Vec::with_capacity(self.cause_chain.len() + 1);
        cause_chain.push(self.kind);
        cause_chain.extend(self.cause_chain);
        Self {
            kind: kind.into(),
            message: message.into(),
            cause_chain,
        }
    }

    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause_chain(&self) -> &[FailureKind] {
        &self.cause_chain
    }

    /// The failure's own kind followed by every kind in its cause chain.
    pub fn kinds(&self) -> impl Iterator<Item = &FailureKind> {
        std::iter::once(&self.kind).chain(self.cause_chain.iter())
    }

    /// True when `kind` is this failure's kind or appears in its cause chain.
    pub fn is_or_caused_by(&self, kind: &str) -> bool {
        self.kinds().any(|k| k.as_str() == kind)
    }
}
