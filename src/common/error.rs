//! Error types for the scenario engine
//!
//! Two disjoint classes live here. [`Error`] is a *fault*: something went
//! wrong with the infrastructure around a test (a missing dependency, a
//! fixture that is not registered, a timeout arithmetic conflict) and the
//! enclosing scenario stops immediately. [`Failure`] is an *assertion
//! failure*: the system under test did not behave as expected. Failures are
//! recorded per action and may be retried; they never abort a scenario.

use std::io;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Faults that abort the enclosing scenario
#[derive(Error, Debug)]
pub enum Error {
    // === Dependency Errors ===
    #[error("Dependency '{name}' not satisfied: executable not found on PATH")]
    DependencyNotFound { name: String },

    #[error("Error checking for program '{name}': {reason}")]
    DependencyLookup { name: String, reason: String },

    #[error("Failed to probe version of dependency '{name}': {source}")]
    DependencyProbe {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Dependency '{name}' not satisfied: unable to determine version for constraint '{constraint}': {reason}")]
    DependencyVersionUnknown {
        name: String,
        constraint: String,
        reason: String,
    },

    #[error("Dependency '{name}' not satisfied: version {found} does not match constraint '{constraint}'")]
    DependencyVersionMismatch {
        name: String,
        constraint: String,
        found: String,
    },

    // === Fixture Errors ===
    #[error("Required fixture missing: {0}")]
    FixtureMissing(String),

    #[error("Fixture '{name}' failed to start: {reason}")]
    FixtureStart { name: String, reason: String },

    // === Timeout Errors ===
    #[error("Timeout conflict: host deadline of {} {detail}", round_secs(.host_timeout))]
    TimeoutConflict {
        host_timeout: Duration,
        detail: String,
    },

    // === Action Errors ===
    #[error("Action '{action}' aborted the scenario: {reason}")]
    Action { action: String, reason: String },

    #[error("Action '{0}' panicked during evaluation")]
    ActionPanicked(String),

    // === Plugin / Loading Errors ===
    #[error("No plugin could parse action {index} in '{path}'")]
    UnknownSpec { path: String, index: usize },

    #[error("Unknown plugin '{0}'")]
    UnknownPlugin(String),

    #[error("Plugin name or alias '{0}' is already registered")]
    DuplicatePlugin(String),

    #[error("Error parsing '{path}': {message}")]
    Parse { path: String, message: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a fault reported by an action's evaluation
    pub fn action<S: Into<String>>(action: &str, reason: S) -> Self {
        Self::Action {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a parse error for a document at `path`
    pub fn parse<S: Into<String>>(path: &str, message: S) -> Self {
        Self::Parse {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Create a timeout conflict describing which scenario timing exceeds
    /// the host's remaining execution time.
    ///
    /// A non-zero total wait takes precedence over the maximum timeout.
    pub fn timeout_conflict(host_timeout: Duration, total_wait: Duration, max_timeout: Duration) -> Self {
        let detail = if !total_wait.is_zero() {
            format!(
                "is shorter than the total wait time in the scenario: {}. \
                 Either decrease the wait times or increase the host timeout.",
                round_secs(&total_wait)
            )
        } else {
            format!(
                "is shorter than the maximum timeout specified in the scenario: {}. \
                 Either decrease the scenario or action timeout or increase the host timeout.",
                round_secs(&max_timeout)
            )
        };
        Self::TimeoutConflict {
            host_timeout,
            detail,
        }
    }
}

fn round_secs(d: &Duration) -> String {
    format!("{}s", d.as_secs_f64().round() as u64)
}

/// An assertion failure recorded against a single action
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Failure {
    #[error("assertion failed: not equal: expected {expected} but got {got}")]
    NotEqual { expected: String, got: String },

    #[error("assertion failed: variable '{0}' was not set by any previous action")]
    VariableMissing(String),

    #[error("assertion failed: timeout exceeded ({after:?})")]
    TimeoutExceeded { after: Duration },

    #[error("assertion failed: cancelled before completion")]
    Cancelled,

    #[error("assertion failed: unexpected error: {0}")]
    UnexpectedError(String),

    #[error("assertion failed: {0}")]
    Assertion(String),
}

impl Failure {
    /// Create a not-equal failure from any displayable pair
    pub fn not_equal(expected: impl std::fmt::Display, got: impl std::fmt::Display) -> Self {
        Self::NotEqual {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// Create a free-form assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_conflict_prefers_total_wait() {
        let err = Error::timeout_conflict(
            Duration::from_secs(10),
            Duration::from_secs(30),
            Duration::from_secs(60),
        );
        let msg = err.to_string();
        assert!(msg.contains("host deadline of 10s"));
        assert!(msg.contains("total wait time in the scenario: 30s"));
    }

    #[test]
    fn test_timeout_conflict_max_timeout() {
        let err = Error::timeout_conflict(Duration::from_secs(5), Duration::ZERO, Duration::from_secs(20));
        assert!(err.to_string().contains("maximum timeout specified in the scenario: 20s"));
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            Failure::not_equal("42", "41").to_string(),
            "assertion failed: not equal: expected 42 but got 41"
        );
        assert!(Failure::TimeoutExceeded {
            after: Duration::from_millis(50)
        }
        .to_string()
        .contains("timeout exceeded (50ms)"));
    }
}
