//! Retry, timeout and wait policies

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::common::duration;

/// How an action is retried after an evaluation that produced failures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Retry {
    /// Delay between attempts in constant mode. Falls back to the engine
    /// default when absent.
    pub interval: Option<Duration>,
    /// Upper bound on evaluations. Absent means unbounded, limited only by
    /// the ambient deadline.
    pub attempts: Option<u32>,
    /// Use an exponential-with-jitter delay sequence instead of a constant one
    pub exponential: bool,
}

impl Retry {
    /// Constant-interval retry with a bounded number of attempts
    pub fn constant(interval: Duration, attempts: u32) -> Self {
        Self {
            interval: Some(interval),
            attempts: Some(attempts),
            exponential: false,
        }
    }

    /// Exponential retry, optionally bounded
    pub fn exponential(attempts: Option<u32>) -> Self {
        Self {
            interval: None,
            attempts,
            exponential: true,
        }
    }
}

impl fmt::Display for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry")?;
        if let Some(attempts) = self.attempts {
            write!(f, " (attempts: {})", attempts)?;
        }
        if let Some(interval) = self.interval {
            write!(f, " (interval: {:?})", interval)?;
        }
        write!(f, " (exponential: {})", self.exponential)
    }
}

/// A retry override at one level of the precedence chain
///
/// `Unset` means "no opinion, keep looking at lower levels"; `Disabled`
/// stops the search and forces single-shot evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RetrySetting {
    #[default]
    Unset,
    Disabled,
    Configured(Retry),
}

impl RetrySetting {
    /// Whether this level expresses an opinion
    pub fn is_set(&self) -> bool {
        !matches!(self, RetrySetting::Unset)
    }

    /// The effective policy at this level, `None` when disabled or unset
    pub fn policy(&self) -> Option<&Retry> {
        match self {
            RetrySetting::Configured(retry) => Some(retry),
            _ => None,
        }
    }
}

/// Accepted spellings of a retry policy in a document
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRetry {
    Flag(bool),
    Word(String),
    Policy {
        #[serde(default, deserialize_with = "duration::deserialize_option")]
        interval: Option<Duration>,
        #[serde(default)]
        attempts: Option<u32>,
        #[serde(default)]
        exponential: bool,
    },
}

impl<'de> Deserialize<'de> for RetrySetting {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawRetry::deserialize(deserializer)? {
            RawRetry::Flag(false) => Ok(RetrySetting::Disabled),
            RawRetry::Flag(true) => Ok(RetrySetting::Configured(Retry::default())),
            RawRetry::Word(word) => match word.to_lowercase().as_str() {
                "none" | "disabled" | "off" => Ok(RetrySetting::Disabled),
                _ => Err(serde::de::Error::custom(format!(
                    "expected retry specification, got '{}'",
                    word
                ))),
            },
            RawRetry::Policy {
                interval,
                attempts,
                exponential,
            } => {
                if attempts == Some(0) {
                    return Err(serde::de::Error::custom("invalid retry attempts: 0"));
                }
                Ok(RetrySetting::Configured(Retry {
                    interval,
                    attempts,
                    exponential,
                }))
            }
        }
    }
}

impl From<Retry> for RetrySetting {
    fn from(retry: Retry) -> Self {
        RetrySetting::Configured(retry)
    }
}

/// Deadline applied to one action's evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timeout(pub Duration);

impl Timeout {
    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout(d)
    }
}

impl<'de> Deserialize<'de> for Timeout {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        duration::parse(&raw)
            .map(Timeout)
            .ok_or_else(|| serde::de::Error::custom(format!("expected timeout specification, got '{}'", raw)))
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Plain sleeps applied around an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Wait {
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    pub before: Option<Duration>,
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    pub after: Option<Duration>,
}

impl Wait {
    /// Sum of both waits
    pub fn total(&self) -> Duration {
        self.before.unwrap_or_default() + self.after.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_setting_states() {
        assert!(!RetrySetting::Unset.is_set());
        assert!(RetrySetting::Disabled.is_set());
        assert!(RetrySetting::Disabled.policy().is_none());

        let configured = RetrySetting::from(Retry::constant(Duration::from_millis(10), 2));
        assert!(configured.is_set());
        assert_eq!(configured.policy().and_then(|r| r.attempts), Some(2));
    }

    #[test]
    fn test_retry_display() {
        let retry = Retry::constant(Duration::from_millis(100), 5);
        assert_eq!(
            retry.to_string(),
            "retry (attempts: 5) (interval: 100ms) (exponential: false)"
        );
    }

    #[test]
    fn test_deserialize_retry_forms() {
        let disabled: RetrySetting = serde_yaml::from_str("false").unwrap();
        assert_eq!(disabled, RetrySetting::Disabled);
        let none: RetrySetting = serde_yaml::from_str("none").unwrap();
        assert_eq!(none, RetrySetting::Disabled);

        let policy: RetrySetting =
            serde_yaml::from_str("{attempts: 3, interval: 250ms}").unwrap();
        assert_eq!(
            policy,
            RetrySetting::Configured(Retry::constant(Duration::from_millis(250), 3))
        );
    }

    #[test]
    fn test_deserialize_rejects_zero_attempts() {
        assert!(serde_yaml::from_str::<RetrySetting>("{attempts: 0}").is_err());
        assert!(serde_yaml::from_str::<RetrySetting>("sometimes").is_err());
    }

    #[test]
    fn test_deserialize_timeout_and_wait() {
        let timeout: Timeout = serde_yaml::from_str("2s").unwrap();
        assert_eq!(timeout.duration(), Duration::from_secs(2));

        let wait: Wait = serde_yaml::from_str("{before: 10ms}").unwrap();
        assert_eq!(wait.before, Some(Duration::from_millis(10)));
        assert_eq!(wait.after, None);
    }

    #[test]
    fn test_wait_total() {
        let wait = Wait {
            before: Some(Duration::from_secs(1)),
            after: None,
        };
        assert_eq!(wait.total(), Duration::from_secs(1));
        assert_eq!(Wait::default().total(), Duration::ZERO);
    }
}
