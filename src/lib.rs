//! Gauntlet - a declarative test scenario execution engine
//!
//! Scenarios are ordered lists of pluggable actions. The engine checks a
//! scenario's dependencies, starts its fixtures, evaluates its skip
//! conditions and then runs each action in turn with retries and deadlines,
//! passing data written by one action on to the next. Scenarios run either
//! inside `#[test]` functions ([`host::NativeHost`]) or as a standalone
//! batch collected in a [`run::Run`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod common;
pub mod context;
pub mod engine;
pub mod host;
pub mod parse;
pub mod plugins;
pub mod registry;
pub mod run;

// Re-export commonly used types for tests
pub use common::{Error, Failure, Result};
pub use context::RunContext;
pub use engine::{Scenario, Suite};
pub use host::{Host, NativeHost};
pub use registry::Registry;
pub use run::Run;
