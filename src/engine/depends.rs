//! Dependency verification
//!
//! Checks that the executables a scenario needs are present, and new
//! enough, before any of its actions run.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use semver::Version;
use tokio::process::Command;

use crate::api::dependency::default_filter;
use crate::api::{Dependency, VersionConstraint};
use crate::common::{Error, Result};
use crate::context::RunContext;

/// Verify every dependency, stopping at the first unsatisfied one
pub async fn check_dependencies(ctx: &RunContext, deps: &[Dependency]) -> Result<()> {
    for dep in deps {
        check_dependency(ctx, dep).await?;
    }
    Ok(())
}

pub async fn check_dependency(ctx: &RunContext, dep: &Dependency) -> Result<()> {
    if let Some(os) = &dep.os {
        if !os_matches(os) {
            ctx.debug(format!(
                "dependency '{}' only applies to {}, skipping",
                dep.name, os
            ));
            return Ok(());
        }
    }

    let path = locate(&dep.name, ctx.settings().search_path.as_deref())?;
    ctx.debug(format!("dependency '{}' found at {}", dep.name, path.display()));

    let Some(constraint) = &dep.version else {
        return Ok(());
    };
    let found = probe_version(ctx, dep, &path, constraint).await?;
    if !constraint.req.matches(&found) {
        return Err(Error::DependencyVersionMismatch {
            name: dep.name.clone(),
            constraint: constraint.raw.clone(),
            found: found.to_string(),
        });
    }
    ctx.debug(format!(
        "dependency '{}' version {} satisfies '{}'",
        dep.name, found, constraint
    ));
    Ok(())
}

/// Whether an OS constraint names the host OS
pub fn os_matches(os: &str) -> bool {
    normalize_os(os) == normalize_os(std::env::consts::OS)
}

fn normalize_os(os: &str) -> String {
    let os = os.trim().to_lowercase();
    match os.as_str() {
        "darwin" | "osx" | "macosx" => "macos".to_string(),
        _ => os,
    }
}

fn locate(name: &str, search_path: Option<&OsStr>) -> Result<PathBuf> {
    let found = match search_path {
        Some(paths) => {
            let cwd = std::env::current_dir()?;
            which::which_in(name, Some(paths), cwd)
        }
        None => which::which(name),
    };
    match found {
        Ok(path) => Ok(path),
        Err(which::Error::CannotFindBinaryPath) => Err(Error::DependencyNotFound {
            name: name.to_string(),
        }),
        Err(e) => Err(Error::DependencyLookup {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

async fn probe_version(
    ctx: &RunContext,
    dep: &Dependency,
    path: &Path,
    constraint: &VersionConstraint,
) -> Result<Version> {
    let (args, filter) = match &constraint.selector {
        Some(sel) if !sel.args.is_empty() => (sel.args.clone(), &sel.filter),
        Some(sel) => (ctx.settings().version_args.clone(), &sel.filter),
        None => (ctx.settings().version_args.clone(), default_filter()),
    };

    let output = Command::new(path)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::DependencyProbe {
            name: dep.name.clone(),
            source: e,
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    ctx.debug(format!(
        "dependency '{}' {} output: {}",
        dep.name,
        args.join(" "),
        combined.trim()
    ));

    let unknown = |reason: String| Error::DependencyVersionUnknown {
        name: dep.name.clone(),
        constraint: constraint.raw.clone(),
        reason,
    };
    let token = filter
        .find(&combined)
        .map(|m| m.as_str())
        .ok_or_else(|| unknown(format!("no version found in output of '{}'", args.join(" "))))?;
    parse_loose(token).map_err(|e| unknown(format!("'{}' is not a version: {}", token, e)))
}

/// Parse a version that may have a `v` prefix or omit minor/patch
pub fn parse_loose(token: &str) -> std::result::Result<Version, semver::Error> {
    let token = token.trim().trim_start_matches(['v', 'V']);
    let split = token.find(['-', '+']).unwrap_or(token.len());
    let (core, rest) = token.split_at(split);
    let mut parts: Vec<&str> = core.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&format!("{}{}", parts.join("."), rest))
}
