//! The `var` plugin: store and check scenario variables
//!
//! ```yaml
//! tests:
//!   - var:
//!       set:
//!         TOKEN: abc123
//!         HOME_DIR: { env: HOME }
//!         TITLE: { fixture: books, path: /books/0/title }
//!   - var:
//!       expect:
//!         TOKEN: abc123
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::api::{ActionBase, Evaluable, Outcome, Plugin, PluginDefaults, PluginInfo, SpecFactory};
use crate::common::{Error, Failure, Result};
use crate::context::RunContext;

const PLUGIN_NAME: &str = "var";

pub struct VarPlugin {
    info: PluginInfo,
}

impl VarPlugin {
    pub fn new() -> Self {
        let mut info = PluginInfo::new(PLUGIN_NAME);
        info.aliases = vec!["vars".to_string()];
        info.description = "Sets and checks scenario variables".to_string();
        Self { info }
    }
}

impl Default for VarPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for VarPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn specs(&self) -> Vec<Box<dyn SpecFactory>> {
        vec![Box::new(SetFactory), Box::new(ExpectFactory)]
    }
}

/// The `var:` section of an action body, if it has one
fn section<'a>(body: &'a serde_yaml::Mapping, key: &str) -> Option<&'a serde_yaml::Value> {
    ["var", "vars"]
        .iter()
        .find_map(|name| body.get(*name))
        .and_then(|v| v.as_mapping())
        .and_then(|m| m.get(key))
}

fn decode<T: DeserializeOwned>(base: &ActionBase, value: &serde_yaml::Value) -> Result<T> {
    serde_yaml::from_value(value.clone())
        .map_err(|e| Error::Config(format!("invalid var action {}: {}", base.title(), e)))
}

/// Where a `set` value comes from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VarSource {
    Env { env: String },
    Fixture { fixture: String, path: String },
    Literal(Value),
}

struct SetFactory;

impl SpecFactory for SetFactory {
    fn kind(&self) -> &'static str {
        "set"
    }

    fn accepts(&self, body: &serde_yaml::Mapping) -> bool {
        section(body, "set").is_some()
    }

    fn build(
        &self,
        base: ActionBase,
        body: &serde_yaml::Mapping,
        _defaults: &PluginDefaults,
    ) -> Result<Arc<dyn Evaluable>> {
        let Some(value) = section(body, "set") else {
            return Err(Error::Internal("var set without a set section".to_string()));
        };
        let values: BTreeMap<String, VarSource> = decode(&base, value)?;
        Ok(Arc::new(VarSet::new(base, values)))
    }
}

/// Stores values under variable names for later actions
pub struct VarSet {
    base: ActionBase,
    values: BTreeMap<String, VarSource>,
}

impl VarSet {
    pub fn new(base: ActionBase, values: BTreeMap<String, VarSource>) -> Self {
        Self { base, values }
    }
}

#[async_trait]
impl Evaluable for VarSet {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    async fn eval(&self, ctx: &RunContext) -> Result<Outcome> {
        let mut outcome = Outcome::new();
        for (name, source) in &self.values {
            match source {
                VarSource::Literal(value) => outcome.set_data(name, value.clone()),
                VarSource::Env { env } => match std::env::var(env) {
                    Ok(value) => outcome.set_data(name, value),
                    Err(_) => outcome.fail(Failure::assertion(format!(
                        "environment variable '{}' is not set",
                        env
                    ))),
                },
                VarSource::Fixture { fixture, path } => {
                    let f = ctx
                        .fixture(fixture)
                        .ok_or_else(|| Error::FixtureMissing(fixture.clone()))?;
                    match f.state(path) {
                        Some(value) => outcome.set_data(name, value),
                        None => outcome.fail(Failure::assertion(format!(
                            "fixture '{}' has no state at '{}'",
                            fixture, path
                        ))),
                    }
                }
            }
        }
        Ok(outcome)
    }
}

struct ExpectFactory;

impl SpecFactory for ExpectFactory {
    fn kind(&self) -> &'static str {
        "expect"
    }

    fn accepts(&self, body: &serde_yaml::Mapping) -> bool {
        section(body, "expect").is_some()
    }

    fn build(
        &self,
        base: ActionBase,
        body: &serde_yaml::Mapping,
        _defaults: &PluginDefaults,
    ) -> Result<Arc<dyn Evaluable>> {
        let Some(value) = section(body, "expect") else {
            return Err(Error::Internal("var expect without an expect section".to_string()));
        };
        let expected: BTreeMap<String, Value> = decode(&base, value)?;
        Ok(Arc::new(VarExpect::new(base, expected)))
    }
}

/// Asserts that variables hold the expected values
pub struct VarExpect {
    base: ActionBase,
    expected: BTreeMap<String, Value>,
}

impl VarExpect {
    pub fn new(base: ActionBase, expected: BTreeMap<String, Value>) -> Self {
        Self { base, expected }
    }
}

/// Scalars compare by their text so `42` matches `"42"`
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Evaluable for VarExpect {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    async fn eval(&self, ctx: &RunContext) -> Result<Outcome> {
        let mut outcome = Outcome::new();
        for (name, want) in &self.expected {
            match ctx.var(name) {
                None => outcome.fail(Failure::VariableMissing(name.clone())),
                Some(got) if got == want || render(got) == render(want) => {}
                Some(got) => outcome.fail(Failure::not_equal(render(want), render(got))),
            }
        }
        Ok(outcome)
    }
}
