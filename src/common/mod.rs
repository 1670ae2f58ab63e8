//! Common utilities shared by the engine, the loader and the CLI

pub mod config;
pub mod duration;
pub mod error;
pub mod logging;
pub mod paths;

pub use config::Settings;
pub use error::{Error, Failure, Result};
