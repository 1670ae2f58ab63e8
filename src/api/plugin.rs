//! Plugin contract
//!
//! A plugin groups one or more action variants under a name, supplies
//! plugin-level retry/timeout defaults and knows how to decode its own
//! section of a scenario's `defaults` block.

use std::sync::Arc;

use serde::Deserialize;

use super::action::{ActionBase, Evaluable};
use super::retry::{RetrySetting, Timeout};
use crate::common::{Error, Result};

/// Basic information about a plugin and the actions it handles
#[derive(Debug, Clone, Default)]
pub struct PluginInfo {
    /// Primary name of the plugin
    pub name: String,
    /// Optional aliased names
    pub aliases: Vec<String>,
    /// What kinds of actions the plugin handles
    pub description: String,
    /// Default timeout for actions of this plugin
    pub timeout: Option<Timeout>,
    /// Default retry for actions of this plugin
    pub retry: RetrySetting,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether `name` matches the plugin name or one of its aliases
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// A plugin's entry in a scenario's `defaults` block
///
/// `timeout` and `retry` feed the precedence resolver; every other key is
/// kept in `extra` for the plugin's variants to interpret.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginDefaults {
    #[serde(default)]
    pub timeout: Option<Timeout>,
    #[serde(default)]
    pub retry: RetrySetting,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl PluginDefaults {
    /// Decode a `defaults.<plugin>` section
    pub fn from_section(plugin: &str, section: &serde_yaml::Value) -> Result<Self> {
        serde_yaml::from_value(section.clone())
            .map_err(|e| Error::Config(format!("invalid defaults for plugin '{}': {}", plugin, e)))
    }
}

/// One action variant a plugin can produce
pub trait SpecFactory: Send + Sync {
    /// Short name of the variant, used in diagnostics
    fn kind(&self) -> &'static str;

    /// Whether this variant recognises the action body
    fn accepts(&self, body: &serde_yaml::Mapping) -> bool;

    /// Build the action. Only called after `accepts` returned true.
    fn build(
        &self,
        base: ActionBase,
        body: &serde_yaml::Mapping,
        defaults: &PluginDefaults,
    ) -> Result<Arc<dyn Evaluable>>;
}

/// The driver interface for a family of actions
pub trait Plugin: Send + Sync {
    fn info(&self) -> &PluginInfo;

    /// Decode this plugin's section of a scenario's `defaults` block
    fn defaults(&self, section: &serde_yaml::Value) -> Result<PluginDefaults> {
        PluginDefaults::from_section(&self.info().name, section)
    }

    /// The variants this plugin can build, in match order
    fn specs(&self) -> Vec<Box<dyn SpecFactory>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_answers_to_aliases() {
        let mut info = PluginInfo::new("var");
        info.aliases = vec!["vars".to_string()];
        assert!(info.answers_to("VAR"));
        assert!(info.answers_to("vars"));
        assert!(!info.answers_to("exec"));
    }

    #[test]
    fn test_plugin_defaults_keeps_extra_keys() {
        let section: serde_yaml::Value =
            serde_yaml::from_str("{timeout: 1s, retry: false, namespace: test}").unwrap();
        let defaults = PluginDefaults::from_section("kube", &section).unwrap();
        assert_eq!(defaults.timeout, Some(Timeout(Duration::from_secs(1))));
        assert_eq!(defaults.retry, RetrySetting::Disabled);
        assert_eq!(
            defaults.extra.get("namespace"),
            Some(&serde_yaml::Value::from("test"))
        );
        assert!(defaults.extra.get("timeout").is_none());
    }
}
