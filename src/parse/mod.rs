//! Scenario documents
//!
//! Turns YAML test definitions into [`Scenario`] values, using the plugin
//! [`Registry`] to build each action from its plugin-specific body.
//!
//! ```yaml
//! name: books
//! fixtures: [books]
//! depends:
//!   - name: curl
//!     when: { os: linux, version: ">= 7.0" }
//! defaults:
//!   timeout: 5s
//!   var: { retry: false }
//! skip-if:
//!   - var: { expect: { SKIP: "yes" } }
//! tests:
//!   - name: remember
//!     var: { set: { V: 42 } }
//!   - var: { expect: { V: 42 } }
//!     retry: { attempts: 3, interval: 100ms }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::api::{
    ActionBase, BoundAction, Dependency, PluginDefaults, RetrySetting, Timeout, VersionConstraint,
    VersionSelector, Wait,
};
use crate::common::{Error, Result};
use crate::engine::{Defaults, Scenario, Suite};
use crate::registry::Registry;

/// Keys every action understands regardless of plugin
const BASE_KEYS: &[&str] = &["name", "description", "timeout", "retry", "wait", "on"];

#[derive(Debug, Deserialize)]
struct RawScenario {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    fixtures: Vec<String>,
    #[serde(default)]
    depends: Vec<RawDependency>,
    #[serde(default)]
    defaults: Mapping,
    #[serde(default, rename = "skip-if")]
    skip_if: Vec<Mapping>,
    #[serde(default)]
    tests: Vec<Mapping>,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    name: String,
    #[serde(default)]
    when: Option<RawWhen>,
    #[serde(default)]
    selector: Option<RawSelector>,
}

#[derive(Debug, Deserialize)]
struct RawWhen {
    #[serde(default)]
    os: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSelector {
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    filter: Option<String>,
}

/// Parse one scenario document
///
/// `path` is used for diagnostics, as the result key and, when the document
/// has no `name`, for the scenario's title.
pub fn load_str(registry: &Registry, path: Option<&Path>, yaml: &str) -> Result<Scenario> {
    let source = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<input>".to_string());
    let raw: RawScenario =
        serde_yaml::from_str(yaml).map_err(|e| Error::parse(&source, e.to_string()))?;

    let defaults = parse_defaults(registry, &source, &raw.defaults)?;

    let depends = raw
        .depends
        .into_iter()
        .map(|d| parse_dependency(&source, d))
        .collect::<Result<Vec<_>>>()?;

    let skip_if = raw
        .skip_if
        .iter()
        .enumerate()
        .map(|(idx, m)| parse_action(registry, &source, idx, m, &defaults.plugins))
        .collect::<Result<Vec<_>>>()?;

    let actions = raw
        .tests
        .iter()
        .enumerate()
        .map(|(idx, m)| parse_action(registry, &source, idx, m, &defaults.plugins))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(path = %source, actions = actions.len(), "parsed scenario");

    Ok(Scenario {
        name: raw.name.unwrap_or_default(),
        description: raw.description,
        path: path.map(Path::to_path_buf),
        fixtures: raw.fixtures,
        depends,
        skip_if,
        actions,
        defaults,
    })
}

/// Read and parse one scenario file
pub fn load_file(registry: &Registry, path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    load_str(registry, Some(path), &content)
}

/// Load a file, or every `*.yaml`/`*.yml` file of a directory in name order
pub fn load_path(registry: &Registry, path: &Path) -> Result<Suite> {
    let files = if path.is_dir() {
        scenario_files(path)?
    } else {
        vec![path.to_path_buf()]
    };
    let scenarios = files
        .iter()
        .map(|f| load_file(registry, f))
        .collect::<Result<Vec<_>>>()?;
    Ok(Suite {
        path: Some(path.to_path_buf()),
        scenarios,
    })
}

fn scenario_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn parse_defaults(registry: &Registry, path: &str, raw: &Mapping) -> Result<Defaults> {
    let mut defaults = Defaults::default();
    for (key, value) in raw {
        let Some(key) = key.as_str() else {
            return Err(Error::parse(path, "defaults keys must be strings"));
        };
        match key {
            "timeout" => defaults.timeout = Some(decode(path, "defaults.timeout", value)?),
            "retry" => defaults.retry = decode(path, "defaults.retry", value)?,
            plugin_name => {
                let plugin = registry
                    .get(plugin_name)
                    .ok_or_else(|| Error::UnknownPlugin(plugin_name.to_string()))?;
                let section: PluginDefaults = plugin.defaults(value)?;
                defaults.plugins.insert(plugin.info().name.clone(), section);
            }
        }
    }
    Ok(defaults)
}

fn parse_dependency(path: &str, raw: RawDependency) -> Result<Dependency> {
    let mut dep = Dependency::new(raw.name);
    let Some(when) = raw.when else {
        if raw.selector.is_some() {
            return Err(Error::parse(path, format!("dependency '{}' has a selector but no version", dep.name)));
        }
        return Ok(dep);
    };
    dep.os = when.os;
    if let Some(version) = when.version {
        let mut constraint = VersionConstraint::parse(&version)?;
        if let Some(sel) = raw.selector {
            let selector = match sel.filter {
                Some(filter) => VersionSelector::new(sel.args, &filter)?,
                None => VersionSelector {
                    args: sel.args,
                    ..Default::default()
                },
            };
            constraint = constraint.with_selector(selector);
        }
        dep.version = Some(constraint);
    }
    Ok(dep)
}

fn parse_action(
    registry: &Registry,
    path: &str,
    index: usize,
    raw: &Mapping,
    defaults: &BTreeMap<String, PluginDefaults>,
) -> Result<BoundAction> {
    let mut base = ActionBase::new(index);
    let field = |key: &str| raw.get(key);
    let at = |key: &str| format!("action {} field '{}'", index, key);

    base.name = field("name").map(|v| decode(path, &at("name"), v)).transpose()?;
    base.description = field("description")
        .map(|v| decode(path, &at("description"), v))
        .transpose()?;
    base.timeout = field("timeout")
        .map(|v| decode::<Timeout>(path, &at("timeout"), v))
        .transpose()?;
    base.retry = field("retry")
        .map(|v| decode::<RetrySetting>(path, &at("retry"), v))
        .transpose()?
        .unwrap_or_default();
    base.wait = field("wait")
        .map(|v| decode::<Wait>(path, &at("wait"), v))
        .transpose()?
        .unwrap_or_default();

    if let Some(on) = field("on") {
        let hook = on
            .as_mapping()
            .and_then(|m| m.get("fail"))
            .and_then(Value::as_mapping)
            .ok_or_else(|| Error::parse(path, format!("{} must be a mapping with a 'fail' action", at("on"))))?;
        let bound = parse_action(registry, path, index, hook, defaults)?;
        base.on_fail = Some(bound.action);
    }

    let mut body = raw.clone();
    for key in BASE_KEYS {
        body.remove(*key);
    }
    registry.parse_action(path, base, &body, defaults)
}

fn decode<T: DeserializeOwned>(path: &str, what: &str, value: &Value) -> Result<T> {
    serde_yaml::from_value(value.clone()).map_err(|e| Error::parse(path, format!("{}: {}", what, e)))
}
