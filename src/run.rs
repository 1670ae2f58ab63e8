//! Standalone run aggregation
//!
//! Collects the outcome of every action of every scenario executed in
//! standalone mode, keyed by scenario path.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::common::Failure;
use crate::host::{Reporter, TestUnit};

/// Snapshot of one action's outcome
#[derive(Debug, Clone, Serialize)]
pub struct UnitResult {
    pub index: usize,
    pub name: String,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub skipped: bool,
    pub failures: Vec<Failure>,
    pub detail: String,
}

impl UnitResult {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// An entry for an action that never ran because its scenario was skipped
    pub fn skipped(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            elapsed: Duration::ZERO,
            skipped: true,
            failures: Vec::new(),
            detail: String::new(),
        }
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Append-only store of per-scenario, per-action outcomes
#[derive(Debug, Default)]
pub struct Run {
    results: Mutex<BTreeMap<String, Vec<UnitResult>>>,
}

impl Run {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished unit for the scenario at `path`
    pub fn store_result(&self, path: &str, index: usize, unit: &TestUnit) {
        self.store(
            path,
            UnitResult {
                index,
                name: unit.name(),
                elapsed: unit.elapsed(),
                skipped: unit.skipped(),
                failures: unit.failures(),
                detail: unit.detail(),
            },
        );
    }

    pub fn store(&self, path: &str, result: UnitResult) {
        self.lock().entry(path.to_string()).or_default().push(result);
    }

    /// Paths of every scenario with at least one stored result, sorted
    pub fn scenario_paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn scenario_results(&self, path: &str) -> Vec<UnitResult> {
        self.lock().get(path).cloned().unwrap_or_default()
    }

    /// Whether every recorded action passed
    pub fn ok(&self) -> bool {
        self.lock().values().flatten().all(UnitResult::ok)
    }

    /// A copy of everything recorded so far
    pub fn snapshot(&self) -> BTreeMap<String, Vec<UnitResult>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<UnitResult>>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Serialize for Run {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(s)
    }
}
