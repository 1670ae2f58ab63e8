//! Plugin registry
//!
//! Populated once before any scenario is loaded and passed by reference to
//! the loader. Plugins are consulted in registration order and within a
//! plugin its variants in the order it lists them: the first variant that
//! accepts an action body wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::{ActionBase, BoundAction, Plugin, PluginDefaults, SpecFactory};
use crate::common::{Error, Result};

struct Entry {
    plugin: Arc<dyn Plugin>,
    specs: Vec<Box<dyn SpecFactory>>,
}

#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in plugin
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for plugin in crate::plugins::builtin() {
            registry.register(plugin)?;
        }
        Ok(registry)
    }

    /// Add a plugin. Names and aliases must be unique, ignoring case.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let info = plugin.info();
        for name in std::iter::once(&info.name).chain(info.aliases.iter()) {
            if self.get(name).is_some() {
                return Err(Error::DuplicatePlugin(name.clone()));
            }
        }
        tracing::debug!(plugin = %info.name, "registered plugin");
        let specs = plugin.specs();
        self.entries.push(Entry { plugin, specs });
        Ok(())
    }

    /// Look up a plugin by name or alias
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.entries
            .iter()
            .find(|e| e.plugin.info().answers_to(name))
            .map(|e| e.plugin.clone())
    }

    /// Registered plugins in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.entries.iter().map(|e| &e.plugin)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build an action from its plugin body
    ///
    /// `defaults` holds the scenario's per-plugin default sections keyed by
    /// plugin name. No accepting variant is an `UnknownSpec` error.
    pub fn parse_action(
        &self,
        path: &str,
        base: ActionBase,
        body: &serde_yaml::Mapping,
        defaults: &BTreeMap<String, PluginDefaults>,
    ) -> Result<BoundAction> {
        for entry in &self.entries {
            let Some(spec) = entry.specs.iter().find(|s| s.accepts(body)) else {
                continue;
            };
            let name = &entry.plugin.info().name;
            tracing::trace!(plugin = %name, kind = spec.kind(), index = base.index, "matched action");
            let empty = PluginDefaults::default();
            let plugin_defaults = defaults.get(name).unwrap_or(&empty);
            let action = spec.build(base, body, plugin_defaults)?;
            return Ok(BoundAction::new(entry.plugin.clone(), action));
        }
        Err(Error::UnknownSpec {
            path: path.to_string(),
            index: base.index,
        })
    }
}
