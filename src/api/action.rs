//! The action contract implemented by plugin variants

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::outcome::Outcome;
use super::plugin::Plugin;
use super::retry::{RetrySetting, Timeout, Wait};
use crate::common::Result;
use crate::context::RunContext;

/// Fields shared by every action regardless of plugin
#[derive(Clone, Default)]
pub struct ActionBase {
    /// 0-based position within the scenario
    pub index: usize,
    pub name: Option<String>,
    pub description: Option<String>,
    pub timeout: Option<Timeout>,
    pub retry: RetrySetting,
    pub wait: Wait,
    /// Evaluated once when the action's terminal outcome has failures
    pub on_fail: Option<Arc<dyn Evaluable>>,
}

impl ActionBase {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn named(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Name, description or index, whichever is most descriptive
    pub fn title(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(desc) = &self.description {
            return desc.clone();
        }
        self.index.to_string()
    }
}

impl fmt::Debug for ActionBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBase")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("wait", &self.wait)
            .field("on_fail", &self.on_fail.is_some())
            .finish()
    }
}

/// A single pluggable test operation
///
/// `eval` may be called several times when the action is retried; every
/// call must return a fresh outcome. Returning `Err` is a fault that aborts
/// the whole scenario. Failed assertions belong in the returned
/// [`Outcome`].
#[async_trait]
pub trait Evaluable: Send + Sync {
    fn base(&self) -> &ActionBase;

    /// Variant-level retry override
    fn retry(&self) -> RetrySetting {
        RetrySetting::Unset
    }

    /// Variant-level timeout override
    fn timeout(&self) -> Option<Timeout> {
        None
    }

    async fn eval(&self, ctx: &RunContext) -> Result<Outcome>;
}

/// An action together with the plugin that produced it
#[derive(Clone)]
pub struct BoundAction {
    pub plugin: Arc<dyn Plugin>,
    pub action: Arc<dyn Evaluable>,
}

impl BoundAction {
    pub fn new(plugin: Arc<dyn Plugin>, action: Arc<dyn Evaluable>) -> Self {
        Self { plugin, action }
    }

    pub fn base(&self) -> &ActionBase {
        self.action.base()
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("plugin", &self.plugin.info().name)
            .field("base", self.action.base())
            .finish()
    }
}
