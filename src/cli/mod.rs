//! CLI command handling
//!
//! Dispatches CLI commands to the engine and formats output.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use colored::Colorize;

use crate::api::JsonFixture;
use crate::commands::{parse_fixture_arg, Commands};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::context::RunContext;
use crate::engine::Suite;
use crate::host::Host;
use crate::parse;
use crate::registry::Registry;
use crate::run::{Run, UnitResult};

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when the command ran but the tests did not pass.
pub async fn dispatch(command: Commands, verbose: bool) -> Result<bool> {
    match command {
        Commands::Run {
            paths,
            fixtures,
            json,
            debug,
        } => run(paths, fixtures, json, debug, verbose).await,

        Commands::Plugins { json } => {
            list_plugins(json)?;
            Ok(true)
        }
    }
}

async fn run(
    paths: Vec<PathBuf>,
    fixtures: Vec<String>,
    json: bool,
    debug: bool,
    verbose: bool,
) -> Result<bool> {
    let config = Config::load()?;
    let registry = Registry::with_builtins()?;

    let mut ctx = RunContext::new().with_settings(config.settings());
    for arg in &fixtures {
        let (name, file) = parse_fixture_arg(arg)
            .ok_or_else(|| Error::Config(format!("invalid fixture '{}', expected NAME=FILE", arg)))?;
        let fixture = JsonFixture::from_path(&file)?;
        ctx = ctx.with_fixture(&name, Arc::new(fixture));
    }
    if debug {
        ctx = ctx.with_sink(Arc::new(Mutex::new(std::io::stderr())));
    }

    let token = ctx.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling remaining actions");
            token.cancel();
        }
    });

    let suites = paths
        .iter()
        .map(|p| parse::load_path(&registry, p))
        .collect::<Result<Vec<Suite>>>()?;

    let run = Run::new();
    let mut fault = None;
    for suite in &suites {
        if let Err(e) = suite.run(&ctx, Host::Standalone(&run)).await {
            fault = Some(e);
            break;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_report(&run, verbose);
    }

    match fault {
        Some(e) => Err(e),
        None => Ok(run.ok()),
    }
}

fn print_report(run: &Run, verbose: bool) {
    let (mut passed, mut failed, mut skipped) = (0, 0, 0);

    for path in run.scenario_paths() {
        println!("\n{} {}", "Scenario:".blue().bold(), path.white().bold());
        for result in run.scenario_results(&path) {
            print_result(&result, verbose);
            if result.skipped {
                skipped += 1;
            } else if result.ok() {
                passed += 1;
            } else {
                failed += 1;
            }
        }
    }

    let summary = format!("{} passed, {} failed, {} skipped", passed, failed, skipped);
    if failed == 0 {
        println!("\n{} {}\n", "✓".green().bold(), summary.green().bold());
    } else {
        println!("\n{} {}\n", "✗".red().bold(), summary.red().bold());
    }
}

fn print_result(result: &UnitResult, verbose: bool) {
    let elapsed = format!("({}ms)", result.elapsed.as_millis());
    if result.skipped {
        println!("  {} {} {}", "-".yellow(), result.name, "skipped".dimmed());
        return;
    }
    if result.ok() {
        println!("  {} {} {}", "✓".green(), result.name, elapsed.dimmed());
    } else {
        println!("  {} {} {}", "✗".red(), result.name, elapsed.dimmed());
        for failure in &result.failures {
            println!("      {}", failure.to_string().red());
        }
    }
    if verbose && !result.detail.is_empty() {
        for line in result.detail.lines() {
            println!("      {}", line.dimmed());
        }
    }
}

fn list_plugins(json: bool) -> Result<()> {
    let registry = Registry::with_builtins()?;

    if json {
        let plugins: Vec<_> = registry
            .iter()
            .map(|p| {
                let info = p.info();
                serde_json::json!({
                    "name": info.name,
                    "aliases": info.aliases,
                    "description": info.description,
                    "timeout": info.timeout.map(|t| t.to_string()),
                    "retry": info.retry.policy().map(|r| r.to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(());
    }

    for plugin in registry.iter() {
        let info = plugin.info();
        let aliases = if info.aliases.is_empty() {
            String::new()
        } else {
            format!("(aliases: {})", info.aliases.join(", "))
        };
        println!("  {:12} {} {}", info.name.bold(), info.description, aliases.dimmed());
    }
    Ok(())
}
