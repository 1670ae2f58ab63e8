//! The value produced by one evaluation of an action

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::common::Failure;

/// A deferred cleanup registered by an action
pub type Cleanup = Box<dyn FnOnce() + Send + 'static>;

/// Result of evaluating an action once
///
/// Holds the assertion failures observed during the evaluation, any named
/// data the action wants to hand to later actions, and cleanups to run when
/// the scenario ends.
#[derive(Default)]
pub struct Outcome {
    failures: Vec<Failure>,
    data: BTreeMap<String, Value>,
    cleanups: Vec<Cleanup>,
}

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// An outcome carrying a single failure
    pub fn failed_with(failure: Failure) -> Self {
        let mut outcome = Self::new();
        outcome.fail(failure);
        outcome
    }

    /// Record an assertion failure
    pub fn fail(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Store a named value visible to later actions in the scenario
    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// Register a cleanup to run at the end of the scenario
    pub fn on_cleanup<F>(&mut self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanups.push(Box::new(cleanup));
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.len()
    }

    /// Take ownership of the registered cleanups, in registration order
    pub fn take_cleanups(&mut self) -> Vec<Cleanup> {
        std::mem::take(&mut self.cleanups)
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("failures", &self.failures)
            .field("data", &self.data)
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}
