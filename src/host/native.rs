//! Host-native runner for use inside `#[test]` functions
//!
//! ```ignore
//! #[tokio::test]
//! async fn books() {
//!     let host = NativeHost::new("books").with_timeout(Duration::from_secs(30));
//!     scenario.run(&RunContext::new(), Host::Native(&host)).await.unwrap();
//!     host.finish();
//!     host.assert_ok();
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::Reporter;
use crate::api::Cleanup;
use crate::common::Failure;

#[derive(Clone)]
pub struct NativeHost {
    inner: Arc<NativeInner>,
}

struct NativeInner {
    name: String,
    state: Mutex<NativeState>,
    cleanups: Mutex<Vec<Cleanup>>,
}

#[derive(Default)]
struct NativeState {
    deadline: Option<Instant>,
    failed: bool,
    skipped: bool,
    done: bool,
    failures: Vec<Failure>,
    logs: Vec<String>,
}

impl NativeHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(NativeInner {
                name: name.into(),
                state: Mutex::new(NativeState::default()),
                cleanups: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Give the host an overall execution deadline `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(self, deadline: Instant) -> Self {
        self.state(|s| s.deadline = Some(deadline));
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.state(|s| s.deadline)
    }

    /// Time left until the deadline, if there is one
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Register a function to run when the host finishes, in LIFO order
    pub fn cleanup(&self, f: Cleanup) {
        self.inner
            .cleanups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(f);
    }

    /// Run registered cleanups and finalize
    pub fn finish(&self) {
        self.inner.run_cleanups();
        self.state(|s| s.done = true);
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.state(|s| s.failures.clone())
    }

    pub fn logs(&self) -> Vec<String> {
        self.state(|s| s.logs.clone())
    }

    /// Panic with every recorded failure, the way a failed test surfaces
    pub fn assert_ok(&self) {
        let (failed, failures) = self.state(|s| (s.failed, s.failures.clone()));
        if failed {
            let lines: Vec<String> = failures.iter().map(|f| format!("  {}", f)).collect();
            panic!("{} failed:\n{}", self.inner.name, lines.join("\n"));
        }
    }

    fn state<T>(&self, f: impl FnOnce(&mut NativeState) -> T) -> T {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl NativeInner {
    fn run_cleanups(&self) {
        let cleanups = std::mem::take(
            &mut *self.cleanups.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
    }
}

impl Drop for NativeInner {
    fn drop(&mut self) {
        self.run_cleanups();
    }
}

impl Reporter for NativeHost {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    fn error(&self, failure: &Failure) {
        tracing::error!(test = %self.inner.name, "{}", failure);
        self.state(|s| {
            s.failures.push(failure.clone());
            s.failed = true;
        });
    }

    fn fail(&self) {
        self.state(|s| s.failed = true);
    }

    fn fail_now(&self) {
        self.state(|s| {
            s.failed = true;
            s.done = true;
        });
    }

    fn failed(&self) -> bool {
        self.state(|s| s.failed)
    }

    fn log(&self, msg: &str) {
        tracing::info!(test = %self.inner.name, "{}", msg);
        self.state(|s| s.logs.push(msg.to_string()));
    }

    fn skip(&self, reason: &str) {
        tracing::info!(test = %self.inner.name, "skipped: {}", reason);
        self.state(|s| {
            s.logs.push(reason.to_string());
            s.skipped = true;
            s.done = true;
        });
    }

    fn skipped(&self) -> bool {
        self.state(|s| s.skipped)
    }
}
