//! Host runners
//!
//! A scenario runs either inside a `#[test]` function ([`NativeHost`]) or
//! as part of a standalone batch whose outcomes are collected in a
//! [`Run`](crate::run::Run). Both report through the [`Reporter`] trait so
//! the per-action orchestration does not care which one it talks to.

mod native;
mod unit;

pub use native::NativeHost;
pub use unit::TestUnit;

use crate::common::Failure;
use crate::run::Run;

/// Minimal reporting contract shared by both hosts
///
/// Implementations are called from the coordinating task and from action
/// evaluation tasks, so all state must be synchronized.
pub trait Reporter: Send + Sync {
    fn name(&self) -> String;

    /// Record a failure and keep going
    fn error(&self, failure: &Failure);

    /// Record a failure and finalize
    fn fatal(&self, failure: &Failure) {
        self.error(failure);
        self.fail_now();
    }

    /// Mark failed without a message
    fn fail(&self);

    /// Mark failed and finalize
    fn fail_now(&self);

    fn failed(&self) -> bool;

    fn log(&self, msg: &str);

    /// Mark skipped and finalize
    fn skip(&self, reason: &str);

    fn skipped(&self) -> bool;
}

/// The host a scenario runs under, chosen once per run
#[derive(Clone, Copy)]
pub enum Host<'a> {
    Native(&'a NativeHost),
    Standalone(&'a Run),
}

impl<'a> From<&'a NativeHost> for Host<'a> {
    fn from(host: &'a NativeHost) -> Self {
        Host::Native(host)
    }
}

impl<'a> From<&'a Run> for Host<'a> {
    fn from(run: &'a Run) -> Self {
        Host::Standalone(run)
    }
}
