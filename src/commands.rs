//! CLI command definitions
//!
//! Defines the clap commands for the gauntlet CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run scenario files or directories of them
    Run {
        /// Scenario files, or directories of *.yaml/*.yml files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Register a JSON fixture: NAME=FILE
        /// Can be specified multiple times: --fixture books=books.json --fixture users=users.json
        #[arg(long = "fixture", short = 'f', value_name = "NAME=FILE")]
        fixtures: Vec<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Write engine debug output to stderr
        #[arg(long)]
        debug: bool,
    },

    /// List the available plugins
    Plugins {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Split a `NAME=FILE` fixture argument
pub fn parse_fixture_arg(arg: &str) -> Option<(String, PathBuf)> {
    let (name, file) = arg.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || file.is_empty() {
        return None;
    }
    Some((name.to_string(), PathBuf::from(file)))
}
