//! The contracts between the engine and its plugins

pub mod action;
pub mod dependency;
pub mod fixture;
pub mod outcome;
pub mod plugin;
pub mod retry;

pub use action::{ActionBase, BoundAction, Evaluable};
pub use dependency::{Dependency, VersionConstraint, VersionSelector};
pub use fixture::{Fixture, JsonFixture};
pub use outcome::{Cleanup, Outcome};
pub use plugin::{Plugin, PluginDefaults, PluginInfo, SpecFactory};
pub use retry::{Retry, RetrySetting, Timeout, Wait};
