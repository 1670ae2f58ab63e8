//! Configuration file handling

use serde::Deserialize;
use std::ffi::OsString;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Engine default for the constant backoff interval
pub const DEFAULT_RETRY_CONSTANT_INTERVAL: Duration = Duration::from_secs(3);

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Dependency verification settings
    #[serde(default)]
    pub dependencies: DependencyConfig,
}

/// Retry settings
#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    /// Interval between attempts when a retry policy does not set one
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_RETRY_CONSTANT_INTERVAL.as_millis() as u64
}

/// Dependency verification settings
#[derive(Debug, Deserialize)]
pub struct DependencyConfig {
    /// Arguments used to probe a dependency's version when the scenario
    /// does not supply a selector
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,

    /// Search path used instead of `PATH` when locating executables
    #[serde(default)]
    pub search_path: Option<String>,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            version_args: default_version_args(),
            search_path: None,
        }
    }
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

/// Runtime settings carried by every [`RunContext`](crate::context::RunContext)
#[derive(Debug, Clone)]
pub struct Settings {
    /// Interval between attempts for constant retry policies without one
    pub retry_interval: Duration,
    /// Default version probe arguments
    pub version_args: Vec<String>,
    /// Executable search path override
    pub search_path: Option<OsString>,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return Self::from_toml(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Convert into the runtime settings used by the engine
    pub fn settings(&self) -> Settings {
        Settings {
            retry_interval: Duration::from_millis(self.retry.interval_ms),
            version_args: self.dependencies.version_args.clone(),
            search_path: self.dependencies.search_path.as_ref().map(OsString::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Config::default().settings();
        assert_eq!(settings.retry_interval, DEFAULT_RETRY_CONSTANT_INTERVAL);
        assert_eq!(settings.version_args, vec!["--version".to_string()]);
        assert!(settings.search_path.is_none());
    }

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml(
            r#"
            [retry]
            interval_ms = 250

            [dependencies]
            version_args = ["-v"]
            search_path = "/opt/tools/bin"
            "#,
        )
        .unwrap();
        let settings = config.settings();
        assert_eq!(settings.retry_interval, Duration::from_millis(250));
        assert_eq!(settings.version_args, vec!["-v".to_string()]);
        assert_eq!(settings.search_path, Some(OsString::from("/opt/tools/bin")));
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        assert!(Config::from_toml("[retry]\ninterval_ms = \"soon\"").is_err());
    }
}
