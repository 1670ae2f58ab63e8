//! The scenario execution engine

pub mod backoff;
pub mod depends;
pub mod resolve;
pub mod scenario;
pub mod suite;

pub use resolve::{Defaults, PolicySource, Resolved};
pub use scenario::{Scenario, Timings};
pub use suite::Suite;
