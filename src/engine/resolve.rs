//! Retry and timeout precedence
//!
//! Both policies are looked up in the same order, stopping at the first
//! level that has an opinion:
//!
//! 1. the action variant's own override
//! 2. the shared base fields of the action
//! 3. the scenario's defaults (the plugin's section first, then the
//!    scenario-wide value)
//! 4. the plugin's built-in default
//!
//! An explicit "disabled" retry at any level ends the search.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::api::{Evaluable, PluginDefaults, PluginInfo, Retry, RetrySetting, Timeout};

/// The `defaults` block of a scenario
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    pub timeout: Option<Timeout>,
    pub retry: RetrySetting,
    /// Per-plugin sections keyed by plugin name
    pub plugins: BTreeMap<String, PluginDefaults>,
}

impl Defaults {
    pub fn for_plugin(&self, name: &str) -> Option<&PluginDefaults> {
        self.plugins.get(name)
    }

    fn retry_for(&self, plugin: &str) -> RetrySetting {
        match self.for_plugin(plugin) {
            Some(d) if d.retry.is_set() => d.retry.clone(),
            _ => self.retry.clone(),
        }
    }

    fn timeout_for(&self, plugin: &str) -> Option<Timeout> {
        self.for_plugin(plugin)
            .and_then(|d| d.timeout)
            .or(self.timeout)
    }
}

/// Which level of the precedence chain a policy came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    Action,
    Base,
    ScenarioDefault,
    PluginDefault,
    /// Nothing configured anywhere
    Fallback,
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicySource::Action => write!(f, "action"),
            PolicySource::Base => write!(f, "base"),
            PolicySource::ScenarioDefault => write!(f, "scenario default"),
            PolicySource::PluginDefault => write!(f, "plugin default"),
            PolicySource::Fallback => write!(f, "fallback"),
        }
    }
}

/// A resolved policy and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: PolicySource,
}

/// Effective retry policy for `action`. `None` means evaluate once.
pub fn resolve_retry(
    action: &dyn Evaluable,
    defaults: &Defaults,
    plugin: &PluginInfo,
) -> Resolved<Option<Retry>> {
    let levels = [
        (PolicySource::Action, action.retry()),
        (PolicySource::Base, action.base().retry.clone()),
        (PolicySource::ScenarioDefault, defaults.retry_for(&plugin.name)),
        (PolicySource::PluginDefault, plugin.retry.clone()),
    ];
    for (source, setting) in levels {
        match setting {
            RetrySetting::Unset => continue,
            RetrySetting::Disabled => return Resolved { value: None, source },
            RetrySetting::Configured(retry) => {
                return Resolved {
                    value: Some(retry),
                    source,
                }
            }
        }
    }
    Resolved {
        value: None,
        source: PolicySource::Fallback,
    }
}

/// Effective timeout for `action`. `None` means unbounded.
pub fn resolve_timeout(
    action: &dyn Evaluable,
    defaults: &Defaults,
    plugin: &PluginInfo,
) -> Resolved<Option<Duration>> {
    let levels = [
        (PolicySource::Action, action.timeout()),
        (PolicySource::Base, action.base().timeout),
        (PolicySource::ScenarioDefault, defaults.timeout_for(&plugin.name)),
        (PolicySource::PluginDefault, plugin.timeout),
    ];
    levels
        .into_iter()
        .find_map(|(source, timeout)| {
            timeout.map(|t| Resolved {
                value: Some(t.duration()),
                source,
            })
        })
        .unwrap_or(Resolved {
            value: None,
            source: PolicySource::Fallback,
        })
}

/// Human-readable description of a resolved retry, for debug output
pub fn describe_retry(resolved: &Resolved<Option<Retry>>) -> String {
    match (&resolved.value, resolved.source) {
        (None, PolicySource::Fallback) => "single-shot (no retry configured)".to_string(),
        (None, source) => format!("retry disabled [{}]", source),
        (Some(retry), source) => format!("using {} [{}]", retry, source),
    }
}

/// Human-readable description of a resolved timeout, for debug output
pub fn describe_timeout(resolved: &Resolved<Option<Duration>>) -> String {
    match resolved.value {
        None => "no timeout".to_string(),
        Some(d) => format!("using timeout of {:?} [{}]", d, resolved.source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ActionBase, Outcome};
    use crate::common::Result;
    use crate::context::RunContext;
    use async_trait::async_trait;

    struct Probe {
        base: ActionBase,
        retry: RetrySetting,
        timeout: Option<Timeout>,
    }

    #[async_trait]
    impl Evaluable for Probe {
        fn base(&self) -> &ActionBase {
            &self.base
        }

        fn retry(&self) -> RetrySetting {
            self.retry.clone()
        }

        fn timeout(&self) -> Option<Timeout> {
            self.timeout
        }

        async fn eval(&self, _ctx: &RunContext) -> Result<Outcome> {
            Ok(Outcome::new())
        }
    }

    fn probe() -> Probe {
        Probe {
            base: ActionBase::new(0),
            retry: RetrySetting::Unset,
            timeout: None,
        }
    }

    fn secs(n: u64) -> Timeout {
        Timeout(Duration::from_secs(n))
    }

    fn attempts(n: u32) -> RetrySetting {
        RetrySetting::Configured(Retry {
            attempts: Some(n),
            ..Default::default()
        })
    }

    #[test]
    fn test_nothing_configured() {
        let info = PluginInfo::new("p");
        let retry = resolve_retry(&probe(), &Defaults::default(), &info);
        assert_eq!(retry.value, None);
        assert_eq!(retry.source, PolicySource::Fallback);
        let timeout = resolve_timeout(&probe(), &Defaults::default(), &info);
        assert_eq!(timeout.value, None);
    }

    #[test]
    fn test_precedence_order() {
        let mut info = PluginInfo::new("p");
        info.retry = attempts(4);
        info.timeout = Some(secs(4));

        let mut defaults = Defaults {
            retry: attempts(3),
            timeout: Some(secs(3)),
            ..Default::default()
        };
        let mut action = probe();
        action.base.retry = attempts(2);
        action.base.timeout = Some(secs(2));
        action.retry = attempts(1);
        action.timeout = Some(secs(1));

        let r = resolve_retry(&action, &defaults, &info);
        assert_eq!((r.value.and_then(|r| r.attempts), r.source), (Some(1), PolicySource::Action));
        let t = resolve_timeout(&action, &defaults, &info);
        assert_eq!(t.value, Some(Duration::from_secs(1)));

        action.retry = RetrySetting::Unset;
        action.timeout = None;
        let r = resolve_retry(&action, &defaults, &info);
        assert_eq!((r.value.and_then(|r| r.attempts), r.source), (Some(2), PolicySource::Base));

        action.base.retry = RetrySetting::Unset;
        action.base.timeout = None;
        let r = resolve_retry(&action, &defaults, &info);
        assert_eq!(r.source, PolicySource::ScenarioDefault);
        let t = resolve_timeout(&action, &defaults, &info);
        assert_eq!(t.value, Some(Duration::from_secs(3)));

        defaults.retry = RetrySetting::Unset;
        defaults.timeout = None;
        let r = resolve_retry(&action, &defaults, &info);
        assert_eq!((r.value.and_then(|r| r.attempts), r.source), (Some(4), PolicySource::PluginDefault));
        let t = resolve_timeout(&action, &defaults, &info);
        assert_eq!(t.source, PolicySource::PluginDefault);
    }

    #[test]
    fn test_disabled_beats_lower_levels() {
        let mut info = PluginInfo::new("p");
        info.retry = attempts(4);
        let defaults = Defaults {
            retry: attempts(3),
            ..Default::default()
        };
        let mut action = probe();
        action.base.retry = RetrySetting::Disabled;

        let r = resolve_retry(&action, &defaults, &info);
        assert_eq!(r.value, None);
        assert_eq!(r.source, PolicySource::Base);
        assert_eq!(describe_retry(&r), "retry disabled [base]");
    }

    #[test]
    fn test_plugin_section_beats_scenario_wide() {
        let info = PluginInfo::new("p");
        let mut defaults = Defaults {
            retry: attempts(3),
            timeout: Some(secs(30)),
            ..Default::default()
        };
        defaults.plugins.insert(
            "p".to_string(),
            PluginDefaults {
                retry: RetrySetting::Disabled,
                timeout: Some(secs(5)),
                ..Default::default()
            },
        );
        let r = resolve_retry(&probe(), &defaults, &info);
        assert_eq!(r.value, None);
        assert_eq!(r.source, PolicySource::ScenarioDefault);
        let t = resolve_timeout(&probe(), &defaults, &info);
        assert_eq!(t.value, Some(Duration::from_secs(5)));
    }
}
