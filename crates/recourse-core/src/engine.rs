//! Named registration of wrapped operations.
//!
//! The engine owns the policy catalogue (usually built from config) and a
//! shared observer. Registering an operation binds its policy and recovery
//! handlers under a unique name and hands back an executable `Retryable`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::RecourseConfig;
use crate::retry::{
    NoOpObserver, PolicyError, RecoveryHandler, RegistryError, RetryObserver, RetryPolicy,
    Retryable, RetryableBuilder,
};

/// What was registered under one operation name.
#[derive(Debug, Clone)]
pub struct OperationInfo {
    pub name: String,
    pub policy: RetryPolicy,
    /// Handler names in registration order.
    pub handlers: Vec<String>,
    pub pinned: Option<String>,
}

pub struct Engine {
    default_policy: RetryPolicy,
    policies: HashMap<String, RetryPolicy>,
    observer: Arc<dyn RetryObserver>,
    operations: BTreeMap<String, OperationInfo>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with the built-in default policy and no observer.
    pub fn new() -> Self {
        Self {
            default_policy: RetryPolicy::default(),
            policies: HashMap::new(),
            observer: Arc::new(NoOpObserver),
            operations: BTreeMap::new(),
        }
    }

    /// Engine whose policy catalogue comes from `cfg`; every section is validated.
    pub fn from_config(cfg: &RecourseConfig) -> Result<Self, PolicyError> {
        let mut policies = HashMap::with_capacity(cfg.policies.len());
        for (name, section) in &cfg.policies {
            policies.insert(name.clone(), section.to_policy()?);
        }
        Ok(Self {
            default_policy: cfg.default.to_policy()?,
            policies,
            ..Self::new()
        })
    }

    /// Observer attached to every operation registered afterwards.
    pub fn with_observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Configured policy for `name`, or the default policy.
    pub fn policy(&self, name: &str) -> &RetryPolicy {
        self.policies.get(name).unwrap_or(&self.default_policy)
    }

    /// Start a builder for `name`, preloaded with its configured policy and the
    /// engine's observer. Finish it with [`install`](Self::install).
    pub fn operation<T>(&self, name: &str) -> RetryableBuilder<T> {
        Retryable::builder(name)
            .policy(self.policy(name).clone())
            .shared_observer(Arc::clone(&self.observer))
    }

    /// Build and record an operation. Names are unique per engine.
    pub fn install<T>(&mut self, builder: RetryableBuilder<T>) -> Result<Retryable<T>, RegistryError> {
        if self.operations.contains_key(builder.name()) {
            return Err(RegistryError::DuplicateOperation(builder.name().to_string()));
        }
        let wrapper = builder.build()?;
        let info = OperationInfo {
            name: wrapper.name().to_string(),
            policy: wrapper.policy().clone(),
            handlers: wrapper
                .registry()
                .handlers()
                .iter()
                .map(|h| h.name().to_string())
                .collect(),
            pinned: wrapper.pinned().map(str::to_string),
        };
        self.operations.insert(info.name.clone(), info);
        Ok(wrapper)
    }

    /// Bind `policy` and `handlers` (in order) to `name`.
    pub fn register<T>(
        &mut self,
        name: &str,
        policy: RetryPolicy,
        handlers: Vec<RecoveryHandler<T>>,
    ) -> Result<Retryable<T>, RegistryError> {
        let builder = handlers
            .into_iter()
            .fold(self.operation(name).policy(policy), |b, h| b.recover(h));
        self.install(builder)
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationInfo> {
        self.operations.values()
    }

    pub fn get(&self, name: &str) -> Option<&OperationInfo> {
        self.operations.get(name)
    }
}
