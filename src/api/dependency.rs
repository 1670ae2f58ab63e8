//! External prerequisites of a scenario

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use semver::VersionReq;

use crate::common::{Error, Result};

/// Permissive pattern for version strings like `v1.2`, `3.4.5-rc.1+build`
pub const DEFAULT_VERSION_PATTERN: &str = r"v?([0-9]+)(\.[0-9]+)?(\.[0-9]+)?(-([0-9A-Za-z\-]+(\.[0-9A-Za-z\-]+)*))?(\+([0-9A-Za-z\-]+(\.[0-9A-Za-z\-]+)*))?";

/// An executable that must be present before a scenario runs
#[derive(Debug, Clone)]
pub struct Dependency {
    /// Executable name looked up on the search path
    pub name: String,
    /// Only check on this OS; any other OS treats the dependency as satisfied
    pub os: Option<String>,
    pub version: Option<VersionConstraint>,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            os: None,
            version: None,
        }
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    pub fn with_version(mut self, constraint: VersionConstraint) -> Self {
        self.version = Some(constraint);
        self
    }
}

/// A semver requirement plus how to discover the installed version
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    pub req: VersionReq,
    /// The requirement as written, kept for diagnostics
    pub raw: String,
    pub selector: Option<VersionSelector>,
}

impl VersionConstraint {
    pub fn parse(raw: &str) -> Result<Self> {
        let req = VersionReq::parse(raw)
            .map_err(|e| Error::Config(format!("invalid version constraint '{}': {}", raw, e)))?;
        Ok(Self {
            req,
            raw: raw.to_string(),
            selector: None,
        })
    }

    pub fn with_selector(mut self, selector: VersionSelector) -> Self {
        self.selector = Some(selector);
        self
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Probe arguments and extraction pattern for a version check
#[derive(Debug, Clone)]
pub struct VersionSelector {
    /// Arguments passed to the executable. Empty means the configured default.
    pub args: Vec<String>,
    pub filter: Regex,
}

impl VersionSelector {
    pub fn new(args: Vec<String>, filter: &str) -> Result<Self> {
        let filter = Regex::new(filter)
            .map_err(|e| Error::Config(format!("invalid version filter '{}': {}", filter, e)))?;
        Ok(Self { args, filter })
    }
}

impl Default for VersionSelector {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            filter: default_filter().clone(),
        }
    }
}

/// The compiled [`DEFAULT_VERSION_PATTERN`]
pub fn default_filter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DEFAULT_VERSION_PATTERN).expect("version pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern_finds_versions() {
        let selector = VersionSelector::default();
        let found = selector.filter.find("git version 2.39.1 (Apple)").unwrap();
        assert_eq!(found.as_str(), "2.39.1");
        let found = selector.filter.find("tool v1.4-beta.2").unwrap();
        assert_eq!(found.as_str(), "v1.4-beta.2");
    }

    #[test]
    fn test_constraint_parse() {
        let c = VersionConstraint::parse(">= 1.2").unwrap();
        assert_eq!(c.to_string(), ">= 1.2");
        assert!(c.req.matches(&semver::Version::new(1, 3, 0)));
        assert!(VersionConstraint::parse("not a version").is_err());
    }

    #[test]
    fn test_selector_rejects_bad_regex() {
        assert!(VersionSelector::new(vec![], "(").is_err());
    }
}
