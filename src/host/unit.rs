//! Standalone test unit
//!
//! Stands in for the test framework's per-test state when scenarios run
//! outside of it. Units form a tree: a failure marks every ancestor failed.

use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::Reporter;
use crate::common::Failure;

#[derive(Clone)]
pub struct TestUnit {
    inner: Arc<UnitInner>,
}

struct UnitInner {
    name: String,
    parent: Option<TestUnit>,
    started: Instant,
    state: RwLock<UnitState>,
}

#[derive(Default)]
struct UnitState {
    failed: bool,
    skipped: bool,
    done: bool,
    failures: Vec<Failure>,
    detail: String,
    elapsed: Option<Duration>,
}

impl TestUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parent(name.into(), None)
    }

    /// A subtest named `<parent>/<name>`
    pub fn child(&self, name: &str) -> Self {
        Self::with_parent(format!("{}/{}", self.inner.name, name), Some(self.clone()))
    }

    fn with_parent(name: String, parent: Option<TestUnit>) -> Self {
        Self {
            inner: Arc::new(UnitInner {
                name,
                parent,
                started: Instant::now(),
                state: RwLock::new(UnitState::default()),
            }),
        }
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.read(|s| s.failures.clone())
    }

    /// Everything logged against this unit
    pub fn detail(&self) -> String {
        self.read(|s| s.detail.clone())
    }

    pub fn is_done(&self) -> bool {
        self.read(|s| s.done)
    }

    /// Time since creation, frozen once the unit finishes
    pub fn elapsed(&self) -> Duration {
        self.read(|s| s.elapsed)
            .unwrap_or_else(|| self.inner.started.elapsed())
    }

    /// Finalize the unit. Later failure calls panic.
    pub fn finish(&self) {
        self.write(|s| {
            s.done = true;
            if s.elapsed.is_none() {
                s.elapsed = Some(self.inner.started.elapsed());
            }
        });
    }

    fn mark_failed(&self) {
        let done = self.write(|s| {
            if !s.done {
                s.failed = true;
            }
            s.done
        });
        if done {
            panic!("fail called after {} has completed", self.inner.name);
        }
        if let Some(parent) = &self.inner.parent {
            parent.mark_failed();
        }
    }

    fn read<T>(&self, f: impl FnOnce(&UnitState) -> T) -> T {
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut UnitState) -> T) -> T {
        let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl Reporter for TestUnit {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    fn error(&self, failure: &Failure) {
        self.log(&failure.to_string());
        self.write(|s| s.failures.push(failure.clone()));
        self.mark_failed();
    }

    fn fail(&self) {
        self.mark_failed();
    }

    fn fail_now(&self) {
        self.mark_failed();
        self.finish();
    }

    fn failed(&self) -> bool {
        self.read(|s| s.failed)
    }

    fn log(&self, msg: &str) {
        self.write(|s| {
            for (i, line) in msg.lines().enumerate() {
                if i > 0 {
                    s.detail.push_str("   ");
                }
                let _ = writeln!(s.detail, "{}", line);
            }
        });
    }

    fn skip(&self, reason: &str) {
        self.log(reason);
        self.write(|s| s.skipped = true);
        self.finish();
    }

    fn skipped(&self) -> bool {
        self.read(|s| s.skipped)
    }
}

impl std::fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestUnit")
            .field("name", &self.inner.name)
            .field("failed", &self.failed())
            .field("skipped", &self.skipped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_propagates_to_parent() {
        let parent = TestUnit::new("scenario");
        let child = parent.child("0:create");
        assert_eq!(child.name(), "scenario/0:create");

        child.error(&Failure::assertion("boom"));
        assert!(child.failed());
        assert!(parent.failed());
        assert_eq!(child.failures().len(), 1);
        assert!(parent.failures().is_empty());
    }

    #[test]
    fn test_log_indents_continuation_lines() {
        let unit = TestUnit::new("u");
        unit.log("first\nsecond");
        unit.log("third");
        assert_eq!(unit.detail(), "first\n   second\nthird\n");
    }

    #[test]
    #[should_panic(expected = "fail called after u has completed")]
    fn test_fail_after_finish_panics() {
        let unit = TestUnit::new("u");
        unit.finish();
        unit.fail();
    }

    #[test]
    fn test_skip_finalizes() {
        let unit = TestUnit::new("u");
        unit.skip("nothing to do");
        assert!(unit.skipped());
        assert!(unit.is_done());
        assert!(!unit.failed());
    }

    #[test]
    fn test_elapsed_frozen_after_finish() {
        let unit = TestUnit::new("u");
        unit.finish();
        let first = unit.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(unit.elapsed(), first);
    }
}
